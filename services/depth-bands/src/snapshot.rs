//! Banded book snapshots
//!
//! Composes the grid sizer and both aggregators over one book sample and
//! tags the result with the metadata the persistence step stores: candle,
//! width, price range, and a SHA-256 checksum over the bands.
//!
//! Buy aggregation must finish first: the sell grid is anchored at the
//! buy grid's terminal line.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use types::ids::{MarketId, SnapshotId};
use types::order::Side;

use crate::bands::{
    aggregate_buy_limited, aggregate_sell_with, buy_grid_terminal, PriceBand, SellBands,
    SellTruncation,
};
use crate::book::BookLevels;
use crate::candles::CandleSummary;
use crate::config::BandingConfig;
use crate::error::{BandingError, InputError};
use crate::grid::bucket_width_for;

/// Both sides of a book reduced to bands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandedBook {
    pub bucket_width: Decimal,
    pub buy_bands: Vec<PriceBand>,
    /// Empty when the book has no asks.
    pub sell: SellBands,
}

/// Reduce a book to bands: width from the best bid, buys over
/// `[0, best_bid]`, sells from the buy grid's terminal line.
///
/// The buy side is required; an empty ask side yields no sell bands.
pub fn band_book(book: &BookLevels, config: &BandingConfig) -> Result<BandedBook, BandingError> {
    let best_bid = book
        .best_bid()
        .ok_or(InputError::EmptySide { side: Side::BUY })?
        .as_decimal();

    let bucket_width = bucket_width_for(best_bid, config.target_bands)?;
    let buy_bands = aggregate_buy_limited(book.bids(), bucket_width, config.max_buy_bands)?;

    let sell = if book.asks().is_empty() {
        SellBands {
            bands: Vec::new(),
            truncation: None,
        }
    } else {
        let start_boundary = buy_grid_terminal(&buy_bands, bucket_width).ok_or(
            InputError::GridOutOfRange {
                side: Side::BUY,
                price: best_bid,
                width: bucket_width,
            },
        )?;
        aggregate_sell_with(
            book.asks(),
            bucket_width,
            start_boundary,
            &config.sell_policy(),
        )?
    };

    Ok(BandedBook {
        bucket_width,
        buy_bands,
        sell,
    })
}

/// A banded book with the metadata stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandSnapshot {
    pub id: SnapshotId,
    /// Monotonic counter of snapshots built by one builder.
    pub sequence: u64,
    pub market: MarketId,
    /// Exchange sequence of the sampled book.
    pub book_sequence: i64,
    pub candle: CandleSummary,
    pub bucket_width: Decimal,
    pub max_buy_price: Decimal,
    pub min_sell_price: Option<Decimal>,
    pub buy_bands: Vec<PriceBand>,
    pub sell_bands: Vec<PriceBand>,
    pub sell_truncation: Option<SellTruncation>,
    /// SHA-256 checksum of the bands for integrity.
    pub checksum: String,
}

/// Builds snapshots under one configuration.
pub struct SnapshotBuilder {
    config: BandingConfig,
    sequence_counter: u64,
}

impl SnapshotBuilder {
    pub fn new(config: BandingConfig) -> Result<Self, InputError> {
        config.validate()?;
        Ok(Self {
            config,
            sequence_counter: 0,
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: BandingConfig::default(),
            sequence_counter: 0,
        }
    }

    /// Band `book` and attach the snapshot metadata.
    ///
    /// The sequence counter only advances on success.
    pub fn build(
        &mut self,
        market: &MarketId,
        book: &BookLevels,
        candle: CandleSummary,
    ) -> Result<BandSnapshot, BandingError> {
        let banded = band_book(book, &self.config)?;
        self.sequence_counter += 1;

        let checksum = compute_checksum(
            &banded.buy_bands,
            &banded.sell.bands,
            banded.bucket_width,
        );

        let snapshot = BandSnapshot {
            id: SnapshotId::new(),
            sequence: self.sequence_counter,
            market: market.clone(),
            book_sequence: book.sequence,
            candle,
            bucket_width: banded.bucket_width,
            max_buy_price: book.best_bid().map(|p| p.as_decimal()).unwrap_or_default(),
            min_sell_price: book.best_ask().map(|p| p.as_decimal()),
            buy_bands: banded.buy_bands,
            sell_bands: banded.sell.bands,
            sell_truncation: banded.sell.truncation,
            checksum,
        };

        debug!(
            snapshot_id = %snapshot.id,
            sequence = snapshot.sequence,
            market = %snapshot.market,
            buy_bands = snapshot.buy_bands.len(),
            sell_bands = snapshot.sell_bands.len(),
            "Snapshot built"
        );

        Ok(snapshot)
    }

    /// Number of snapshots built so far.
    pub fn current_sequence(&self) -> u64 {
        self.sequence_counter
    }

    pub fn config(&self) -> &BandingConfig {
        &self.config
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Compute a SHA-256 checksum over the bands and the width.
fn compute_checksum(buy: &[PriceBand], sell: &[PriceBand], width: Decimal) -> String {
    let mut hasher = Sha256::new();

    for bands in [buy, sell] {
        for band in bands {
            hasher.update(band.side.as_str().as_bytes());
            hasher.update(b":");
            hasher.update(band.min_price.to_string().as_bytes());
            hasher.update(b":");
            hasher.update(band.max_price.to_string().as_bytes());
            hasher.update(b":");
            hasher.update(band.volume.to_string().as_bytes());
            hasher.update(b"|");
        }
        hasher.update(b"---");
    }

    hasher.update(width.to_string().as_bytes());

    format!("{:x}", hasher.finalize())
}

/// Verify that a snapshot's checksum matches its bands.
pub fn verify_snapshot_integrity(snapshot: &BandSnapshot) -> bool {
    let expected = compute_checksum(
        &snapshot.buy_bands,
        &snapshot.sell_bands,
        snapshot.bucket_width,
    );
    snapshot.checksum == expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::MAX_SELL_BANDS;
    use crate::book::OrderLevel;
    use rust_decimal_macros::dec;
    use types::numeric::{Price, Quantity};

    fn level(price: Decimal, volume: Decimal) -> OrderLevel {
        OrderLevel::new(
            Price::try_new(price).unwrap(),
            Quantity::try_new(volume).unwrap(),
            1,
        )
    }

    fn candle() -> CandleSummary {
        CandleSummary {
            open_time: 1_700_000_100,
            low: dec!(95),
            high: dec!(105),
            open: dec!(99),
            close: dec!(100),
            volume: dec!(42),
        }
    }

    fn book() -> BookLevels {
        BookLevels::new(
            vec![
                level(dec!(100), dec!(1)),
                level(dec!(50), dec!(2)),
                level(dec!(10), dec!(3)),
            ],
            vec![
                level(dec!(100.4), dec!(0.5)),
                level(dec!(101.7), dec!(1.5)),
                level(dec!(110), dec!(4)),
            ],
            77,
        )
        .unwrap()
    }

    fn market() -> MarketId {
        MarketId::new("BTC/USD")
    }

    #[test]
    fn test_band_book_composes_both_sides() {
        let banded = band_book(&book(), &BandingConfig::default()).unwrap();

        assert_eq!(banded.bucket_width, dec!(1));
        assert_eq!(banded.buy_bands.len(), 100);
        assert_eq!(banded.buy_bands.last().unwrap().max_price, dec!(100));

        let sells = &banded.sell.bands;
        assert_eq!(sells[0].min_price, dec!(100.4));
        assert_eq!(sells[0].max_price, dec!(101));
        assert_eq!(sells.last().unwrap().min_price, dec!(110));
        assert_eq!(sells.iter().map(|b| b.volume).sum::<Decimal>(), dec!(6));
        assert!(sells.iter().all(|b| b.side == Side::SELL));
    }

    #[test]
    fn test_band_book_without_asks() {
        let book = BookLevels::new(vec![level(dec!(20), dec!(1))], vec![], 1).unwrap();
        let banded = band_book(&book, &BandingConfig::default()).unwrap();

        assert!(!banded.buy_bands.is_empty());
        assert!(banded.sell.bands.is_empty());
        assert!(banded.sell.truncation.is_none());
    }

    #[test]
    fn test_band_book_requires_bids() {
        let book = BookLevels::new(vec![], vec![level(dec!(20), dec!(1))], 1).unwrap();
        assert_eq!(
            band_book(&book, &BandingConfig::default()),
            Err(BandingError::InvalidInput(InputError::EmptySide { side: Side::BUY }))
        );
    }

    #[test]
    fn test_band_book_rejects_unreachable_ask() {
        let ask = Decimal::from_i128_with_scale(7 * 10i128.pow(28), 0);
        let book = BookLevels::new(
            vec![level(dec!(0.000001), dec!(1))],
            vec![level(ask, dec!(1))],
            1,
        )
        .unwrap();

        assert!(matches!(
            band_book(&book, &BandingConfig::default()),
            Err(BandingError::InvalidInput(InputError::GridOutOfRange {
                side: Side::SELL,
                ..
            }))
        ));
    }

    #[test]
    fn test_band_book_honours_sell_cap() {
        let asks: Vec<OrderLevel> = (0..300)
            .map(|i| level(dec!(100.5) + Decimal::from(i), dec!(1)))
            .collect();
        let book = BookLevels::new(vec![level(dec!(100), dec!(1))], asks, 1).unwrap();
        let banded = band_book(&book, &BandingConfig::default()).unwrap();

        assert_eq!(banded.sell.bands.len(), MAX_SELL_BANDS);
        assert!(banded.sell.is_truncated());
    }

    #[test]
    fn test_build_snapshot_metadata() {
        let mut builder = SnapshotBuilder::with_defaults();
        let snap = builder.build(&market(), &book(), candle()).unwrap();

        assert_eq!(snap.sequence, 1);
        assert_eq!(snap.book_sequence, 77);
        assert_eq!(snap.max_buy_price, dec!(100));
        assert_eq!(snap.min_sell_price, Some(dec!(100.4)));
        assert_eq!(snap.bucket_width, dec!(1));
        assert_eq!(snap.candle, candle());
        assert!(snap.sell_truncation.is_none());
        assert!(!snap.checksum.is_empty());
    }

    #[test]
    fn test_snapshot_sequence_advances_on_success_only() {
        let mut builder = SnapshotBuilder::with_defaults();
        builder.build(&market(), &book(), candle()).unwrap();

        let empty = BookLevels::new(vec![], vec![], 0).unwrap();
        assert!(builder.build(&market(), &empty, candle()).is_err());
        assert_eq!(builder.current_sequence(), 1);

        let s2 = builder.build(&market(), &book(), candle()).unwrap();
        assert_eq!(s2.sequence, 2);
    }

    #[test]
    fn test_snapshot_integrity() {
        let mut builder = SnapshotBuilder::with_defaults();
        let snap = builder.build(&market(), &book(), candle()).unwrap();

        assert!(verify_snapshot_integrity(&snap));

        let mut tampered = snap.clone();
        tampered.buy_bands[10].volume += dec!(1);
        assert!(!verify_snapshot_integrity(&tampered));
    }

    #[test]
    fn test_deterministic_checksum() {
        let s1 = SnapshotBuilder::with_defaults()
            .build(&market(), &book(), candle())
            .unwrap();
        let s2 = SnapshotBuilder::with_defaults()
            .build(&market(), &book(), candle())
            .unwrap();

        assert_ne!(s1.id, s2.id);
        assert_eq!(s1.checksum, s2.checksum);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = BandingConfig {
            max_sell_bands: 0,
            ..BandingConfig::default()
        };
        assert!(SnapshotBuilder::new(config).is_err());
    }

    #[test]
    fn test_snapshot_serialization() {
        let mut builder = SnapshotBuilder::with_defaults();
        let snap = builder.build(&market(), &book(), candle()).unwrap();

        let json = serde_json::to_string(&snap).unwrap();
        let deserialized: BandSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, deserialized);
        assert!(verify_snapshot_integrity(&deserialized));
    }
}
