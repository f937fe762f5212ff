//! Property tests for the banding engine
//!
//! Random books are banded with the production configuration and checked
//! for:
//! - Volume conservation on both sides
//! - Contiguous grids with no overlap and no zero-width band
//! - Buy grid covering exactly `[0, best_bid]`
//! - Sell grid starting at the best ask and honouring the band cap
//! - Bucket width never below a hundredth of the best bid

use depth_bands::bands::{PriceBand, TruncationReason, MAX_SELL_BANDS};
use depth_bands::book::{BookLevels, OrderLevel};
use depth_bands::config::BandingConfig;
use depth_bands::grid::compute_bucket_width;
use depth_bands::snapshot::band_book;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use types::numeric::{Price, Quantity};

fn level(cents: u64, volume_milli: u64) -> OrderLevel {
    OrderLevel::new(
        Price::try_new(Decimal::new(cents as i64, 2)).unwrap(),
        Quantity::try_new(Decimal::new(volume_milli as i64, 3)).unwrap(),
        1,
    )
}

/// Bids anywhere up to 100 000, asks above the best bid.
fn book_strategy() -> impl Strategy<Value = BookLevels> {
    (
        prop::collection::vec((1u64..=10_000_000, 0u64..=5_000), 1..150),
        prop::collection::vec((1u64..=2_000_000, 0u64..=5_000), 0..300),
    )
        .prop_map(|(bids, asks)| {
            let best_bid = bids.iter().map(|(cents, _)| *cents).max().unwrap_or(1);
            let bids = bids.into_iter().map(|(c, v)| level(c, v)).collect();
            let asks = asks
                .into_iter()
                .map(|(offset, v)| level(best_bid + offset, v))
                .collect();
            BookLevels::sorted(bids, asks, 1)
        })
}

fn volume(levels: &[OrderLevel]) -> Decimal {
    levels.iter().map(|l| l.volume.as_decimal()).sum()
}

fn band_volume(bands: &[PriceBand]) -> Decimal {
    bands.iter().map(|b| b.volume).sum()
}

fn assert_contiguous(bands: &[PriceBand]) -> Result<(), TestCaseError> {
    for band in bands {
        prop_assert!(band.min_price < band.max_price, "empty band {:?}", band);
    }
    for pair in bands.windows(2) {
        prop_assert_eq!(pair[0].max_price, pair[1].min_price);
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_buy_side_partitions_zero_to_best_bid(book in book_strategy()) {
        let banded = band_book(&book, &BandingConfig::default()).unwrap();
        let bands = &banded.buy_bands;
        let best_bid = book.best_bid().unwrap().as_decimal();

        prop_assert!(!bands.is_empty());
        prop_assert!(bands.len() <= 100, "{} buy bands", bands.len());
        prop_assert_eq!(bands[0].min_price, Decimal::ZERO);
        prop_assert_eq!(bands[bands.len() - 1].max_price, best_bid);
        assert_contiguous(bands)?;

        for band in bands {
            prop_assert!(band.width() <= banded.bucket_width);
        }
        prop_assert_eq!(band_volume(bands), volume(book.bids()));
    }

    #[test]
    fn prop_every_bid_lands_in_one_band(book in book_strategy()) {
        let banded = band_book(&book, &BandingConfig::default()).unwrap();
        let bands = &banded.buy_bands;
        let last = bands.len() - 1;

        for bid in book.bids() {
            let price = bid.price.as_decimal();
            let holders = bands
                .iter()
                .enumerate()
                .filter(|(i, b)| {
                    b.contains(price) || (*i == last && price == b.max_price)
                })
                .count();
            prop_assert_eq!(holders, 1, "bid {} in {} bands", price, holders);
        }
    }

    #[test]
    fn prop_sell_side_is_capped_and_accounted(book in book_strategy()) {
        let banded = band_book(&book, &BandingConfig::default()).unwrap();
        let sell = &banded.sell;

        if book.asks().is_empty() {
            prop_assert!(sell.bands.is_empty());
            return Ok(());
        }

        let best_ask = book.best_ask().unwrap().as_decimal();
        prop_assert!(sell.bands.len() <= MAX_SELL_BANDS);
        prop_assert_eq!(sell.bands[0].min_price, best_ask);
        prop_assert!(sell.bands[0].width() <= banded.bucket_width);
        for band in &sell.bands[1..] {
            prop_assert_eq!(band.width(), banded.bucket_width);
        }
        assert_contiguous(&sell.bands)?;

        let total = volume(book.asks());
        match &sell.truncation {
            None => prop_assert_eq!(band_volume(&sell.bands), total),
            Some(truncation) => {
                prop_assert_eq!(truncation.reason, TruncationReason::BandCap);
                prop_assert_eq!(sell.bands.len(), MAX_SELL_BANDS);
                prop_assert_eq!(band_volume(&sell.bands) + truncation.dropped_volume, total);

                let dropped = book
                    .asks()
                    .iter()
                    .filter(|l| l.price.as_decimal() >= truncation.first_dropped_price)
                    .count();
                prop_assert_eq!(truncation.dropped_levels, dropped);
                prop_assert!(truncation.first_dropped_price >= sell.bands[MAX_SELL_BANDS - 1].max_price);
            }
        }
    }

    #[test]
    fn prop_sell_grid_aligned_to_buy_grid(book in book_strategy()) {
        let banded = band_book(&book, &BandingConfig::default()).unwrap();
        let Some(first) = banded.sell.bands.first() else {
            return Ok(());
        };
        let last_buy = banded.buy_bands.last().unwrap();

        let offset = first.max_price - last_buy.min_price;
        prop_assert_eq!(offset % banded.bucket_width, Decimal::ZERO);
    }

    #[test]
    fn prop_width_covers_hundredth_of_price(cents in 1u64..=100_000_000_000) {
        let max = Decimal::new(cents as i64, 2);
        let width = compute_bucket_width(max).unwrap();
        prop_assert!(width > Decimal::ZERO);
        prop_assert!(width >= max / dec!(100), "width {} for {}", width, max);
    }
}

#[test]
fn single_ask_far_above_grid_gets_one_band() {
    let book = BookLevels::new(vec![level(10_000, 1_000)], vec![level(100_500, 1_000)], 1).unwrap();
    let banded = band_book(&book, &BandingConfig::default()).unwrap();

    assert_eq!(banded.sell.bands.len(), 1);
    assert_eq!(banded.sell.bands[0].min_price, dec!(1005));
    assert_eq!(banded.sell.bands[0].max_price, dec!(1006));
    assert_eq!(banded.sell.bands[0].volume, dec!(1));
}
