//! Snapshot cycle
//!
//! One cycle per sampled book: pair the open candle, band the book, check
//! the checksum, hand the snapshot to a sink, record metrics. Scheduling and
//! fetching stay with the caller.

use std::collections::HashSet;
use std::time::Instant;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info};
use types::ids::{MarketId, SnapshotId};

use crate::bands::SellTruncation;
use crate::book::BookLevels;
use crate::candles::{select_candle, CandleError, CandleSummary};
use crate::config::BandingConfig;
use crate::error::{BandingError, InputError};
use crate::metrics::PipelineMetrics;
use crate::snapshot::{verify_snapshot_integrity, BandSnapshot, SnapshotBuilder};
use crate::wire::{self, WireError};

/// Persistence failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("Snapshot {0} already stored")]
    Duplicate(SnapshotId),

    #[error("Sequence error: expected > {last}, got {got}")]
    SequenceRegression { last: u64, got: u64 },

    #[error("Store rejected snapshot: {0}")]
    Rejected(String),
}

/// Rows written for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreReceipt {
    pub snapshot_id: SnapshotId,
    pub buy_rows: usize,
    pub sell_rows: usize,
}

/// Destination for finished snapshots.
pub trait SnapshotSink {
    fn store(&mut self, snapshot: &BandSnapshot) -> Result<StoreReceipt, SinkError>;
}

/// In-process sink keeping snapshots in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    snapshots: Vec<BandSnapshot>,
    ids: HashSet<SnapshotId>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> &[BandSnapshot] {
        &self.snapshots
    }

    pub fn latest(&self) -> Option<&BandSnapshot> {
        self.snapshots.last()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl SnapshotSink for MemorySink {
    fn store(&mut self, snapshot: &BandSnapshot) -> Result<StoreReceipt, SinkError> {
        if self.ids.contains(&snapshot.id) {
            return Err(SinkError::Duplicate(snapshot.id));
        }
        if let Some(last) = self.snapshots.last() {
            if snapshot.sequence <= last.sequence {
                return Err(SinkError::SequenceRegression {
                    last: last.sequence,
                    got: snapshot.sequence,
                });
            }
        }

        self.ids.insert(snapshot.id);
        self.snapshots.push(snapshot.clone());

        Ok(StoreReceipt {
            snapshot_id: snapshot.id,
            buy_rows: snapshot.buy_bands.len(),
            sell_rows: snapshot.sell_bands.len(),
        })
    }
}

/// Why a cycle produced no stored snapshot.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Payload error: {0}")]
    Wire(#[from] WireError),

    #[error("Candle error: {0}")]
    Candle(#[from] CandleError),

    #[error("Banding error: {0}")]
    Banding(#[from] BandingError),

    #[error("Snapshot {0} failed integrity check")]
    Integrity(SnapshotId),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Outcome of a stored cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub snapshot_id: SnapshotId,
    pub sequence: u64,
    pub bucket_width: Decimal,
    pub candle_open_time: i64,
    pub buy_bands: usize,
    pub sell_bands: usize,
    pub sell_truncation: Option<SellTruncation>,
    pub receipt: StoreReceipt,
    pub build_ns: u64,
}

/// Builds and stores snapshots for one market.
pub struct SnapshotPipeline<S: SnapshotSink> {
    market: MarketId,
    builder: SnapshotBuilder,
    sink: S,
    metrics: PipelineMetrics,
}

impl<S: SnapshotSink> SnapshotPipeline<S> {
    pub fn new(market: MarketId, config: BandingConfig, sink: S) -> Result<Self, InputError> {
        Ok(Self {
            market,
            builder: SnapshotBuilder::new(config)?,
            sink,
            metrics: PipelineMetrics::new(),
        })
    }

    /// Run one cycle over an already decoded book and candle list.
    ///
    /// `ticker_secs` is the exchange clock at sampling time.
    pub fn run_cycle(
        &mut self,
        book: &BookLevels,
        candles: &[CandleSummary],
        ticker_secs: i64,
    ) -> Result<CycleReport, PipelineError> {
        let result = self.cycle(book, candles, ticker_secs);
        if let Err(e) = &result {
            self.metrics.record_failure();
            error!(
                market = %self.market,
                book_sequence = book.sequence,
                ticker_secs,
                error = %e,
                "Snapshot cycle failed"
            );
        }
        result
    }

    /// Decode raw exchange payloads and run one cycle.
    pub fn run_cycle_from_payloads(
        &mut self,
        book_json: &str,
        candles_json: &str,
        ticker_json: &str,
    ) -> Result<CycleReport, PipelineError> {
        let decoded = wire::parse_book(book_json).and_then(|book| {
            let candles = wire::parse_candles(candles_json)?;
            let ticker = wire::parse_ticker(ticker_json)?;
            Ok((book, candles, ticker.unix_secs()))
        });

        match decoded {
            Ok((book, candles, ticker_secs)) => self.run_cycle(&book, &candles, ticker_secs),
            Err(e) => {
                self.metrics.record_failure();
                error!(market = %self.market, error = %e, "Snapshot payload rejected");
                Err(e.into())
            }
        }
    }

    fn cycle(
        &mut self,
        book: &BookLevels,
        candles: &[CandleSummary],
        ticker_secs: i64,
    ) -> Result<CycleReport, PipelineError> {
        let granularity = self.builder.config().candle_granularity;
        let candle = select_candle(candles, ticker_secs, granularity)?.clone();

        let started = Instant::now();
        let snapshot = self.builder.build(&self.market, book, candle)?;
        let build_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);

        if !verify_snapshot_integrity(&snapshot) {
            return Err(PipelineError::Integrity(snapshot.id));
        }

        let receipt = self.sink.store(&snapshot)?;

        self.metrics
            .record_snapshot(receipt.buy_rows, receipt.sell_rows, build_ns);
        if let Some(truncation) = &snapshot.sell_truncation {
            self.metrics.record_truncation(truncation);
        }

        info!(
            market = %self.market,
            snapshot_id = %snapshot.id,
            sequence = snapshot.sequence,
            bucket_width = %snapshot.bucket_width,
            buy_bands = receipt.buy_rows,
            sell_bands = receipt.sell_rows,
            truncated = snapshot.sell_truncation.is_some(),
            "Snapshot stored"
        );

        Ok(CycleReport {
            snapshot_id: snapshot.id,
            sequence: snapshot.sequence,
            bucket_width: snapshot.bucket_width,
            candle_open_time: snapshot.candle.open_time,
            buy_bands: receipt.buy_rows,
            sell_bands: receipt.sell_rows,
            sell_truncation: snapshot.sell_truncation,
            receipt,
            build_ns,
        })
    }

    pub fn market(&self) -> &MarketId {
        &self.market
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
