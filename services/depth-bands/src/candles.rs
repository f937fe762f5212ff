//! Candle summaries and candle/book pairing
//!
//! Each snapshot stores the OHLCV candle that was open when the book was
//! sampled. The scheduler supplies the exchange's current timestamp; the
//! candle whose open time falls in `[ts - granularity, ts + 1]` is paired
//! with the book.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Candle granularities offered by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// 1 minute
    M1,
    /// 5 minutes
    M5,
    /// 15 minutes
    M15,
    /// 1 hour
    H1,
    /// 6 hours
    H6,
    /// 1 day
    D1,
}

impl Timeframe {
    /// Duration of this timeframe in seconds.
    pub fn duration_secs(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::H1 => 3600,
            Timeframe::H6 => 6 * 3600,
            Timeframe::D1 => 86400,
        }
    }

    /// Look up a timeframe by its duration in seconds.
    pub fn from_secs(secs: i64) -> Option<Self> {
        Self::all().iter().copied().find(|tf| tf.duration_secs() == secs)
    }

    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::H1,
            Timeframe::H6,
            Timeframe::D1,
        ]
    }

    /// Align a unix timestamp (seconds) to this timeframe's boundary (floor).
    pub fn align_to_boundary(&self, timestamp_secs: i64) -> i64 {
        timestamp_secs.div_euclid(self.duration_secs()) * self.duration_secs()
    }

    /// Window of candle open times paired with a book sampled at `ticker_secs`.
    pub fn pairing_window(&self, ticker_secs: i64) -> (i64, i64) {
        (ticker_secs - self.duration_secs(), ticker_secs + 1)
    }
}

/// Candle pairing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandleError {
    #[error("no candle opened between {start} and {end}")]
    NotFound { start: i64, end: i64 },

    #[error("candle at {open_time} violates OHLC bounds")]
    Invalid { open_time: i64 },
}

/// One OHLCV candle as stored alongside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleSummary {
    /// Unix seconds at which the candle opened.
    pub open_time: i64,
    pub low: Decimal,
    pub high: Decimal,
    pub open: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl CandleSummary {
    /// Validate candle integrity (OHLCV invariants).
    pub fn is_valid(&self) -> bool {
        self.high >= self.open
            && self.high >= self.close
            && self.high >= self.low
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= Decimal::ZERO
    }
}

/// Pick the candle to store with a book sampled at `ticker_secs`.
///
/// Returns the most recent candle opening inside the pairing window. Candles
/// may arrive in any order.
pub fn select_candle<'a>(
    candles: &'a [CandleSummary],
    ticker_secs: i64,
    timeframe: Timeframe,
) -> Result<&'a CandleSummary, CandleError> {
    let (start, end) = timeframe.pairing_window(ticker_secs);
    let candle = candles
        .iter()
        .filter(|c| c.open_time >= start && c.open_time <= end)
        .max_by_key(|c| c.open_time)
        .ok_or(CandleError::NotFound { start, end })?;

    if !candle.is_valid() {
        return Err(CandleError::Invalid {
            open_time: candle.open_time,
        });
    }
    Ok(candle)
}
