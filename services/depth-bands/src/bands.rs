//! Band aggregator
//!
//! Walks price-sorted levels of one side and merges them into contiguous
//! price bands of a fixed width, emitting empty bands for gaps so that the
//! output partitions the side's whole price range.
//!
//! Bands are half-open `[min_price, max_price)`. The last buy band is closed
//! at the top so that it contains the best bid.
//!
//! - Buy side: grid starts at zero and stops exactly at the best bid.
//! - Sell side: grid starts at the best ask, aligned to the buy grid, and
//!   has no natural top. It stops after [`MAX_SELL_BANDS`] bands (or an
//!   optional price ceiling); the levels left out are reported in a
//!   [`SellTruncation`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use types::order::Side;

use crate::book::{check_ascending, check_descending, total_volume, OrderLevel};
use crate::error::{BandingError, InputError};

/// Hard cap on sell bands per snapshot.
pub const MAX_SELL_BANDS: usize = 127;

/// Default ceiling on the number of buy bands an explicit width may produce.
pub const DEFAULT_MAX_BUY_BANDS: usize = 100_000;

/// One price band with the volume resting inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub side: Side,
    /// Inclusive lower bound.
    pub min_price: Decimal,
    /// Exclusive upper bound (inclusive for the last buy band).
    pub max_price: Decimal,
    /// Sum of level volumes inside the band.
    pub volume: Decimal,
}

impl PriceBand {
    fn empty(side: Side, min_price: Decimal, max_price: Decimal) -> Self {
        Self {
            side,
            min_price,
            max_price,
            volume: Decimal::ZERO,
        }
    }

    pub fn width(&self) -> Decimal {
        self.max_price - self.min_price
    }

    /// Whether `price` falls inside `[min_price, max_price)`.
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.min_price && price < self.max_price
    }
}

/// Why the sell grid stopped before covering every ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TruncationReason {
    /// The band count cap was reached.
    BandCap,
    /// The next band would start at or above the price ceiling.
    PriceCeiling,
}

/// Asks left out of the sell bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellTruncation {
    pub reason: TruncationReason,
    /// Number of levels not represented in any band.
    pub dropped_levels: usize,
    /// Volume of those levels.
    pub dropped_volume: Decimal,
    /// Price of the first dropped level.
    pub first_dropped_price: Decimal,
}

/// Sell bands plus a report of anything cut off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellBands {
    pub bands: Vec<PriceBand>,
    pub truncation: Option<SellTruncation>,
}

impl SellBands {
    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }
}

/// Stopping rules for the unbounded sell side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellPolicy {
    /// Band count cap, at most [`MAX_SELL_BANDS`].
    pub max_bands: usize,
    /// Stop opening bands at `best_ask * multiple`.
    pub ceiling_multiple: Option<Decimal>,
}

impl Default for SellPolicy {
    fn default() -> Self {
        Self {
            max_bands: MAX_SELL_BANDS,
            ceiling_multiple: None,
        }
    }
}

impl SellPolicy {
    /// Reason to stop instead of opening a band at `next_min`, given the
    /// number of bands already open.
    fn stop_reason(
        &self,
        open_bands: usize,
        next_min: Decimal,
        ceiling: Option<Decimal>,
    ) -> Option<TruncationReason> {
        if open_bands >= self.max_bands.min(MAX_SELL_BANDS) {
            Some(TruncationReason::BandCap)
        } else if ceiling.is_some_and(|ceiling| next_min >= ceiling) {
            Some(TruncationReason::PriceCeiling)
        } else {
            None
        }
    }
}

/// Aggregate bids into bands covering `[0, best_bid]`.
///
/// `buy_levels` must be in descending price order (best bid first).
pub fn aggregate_buy(
    buy_levels: &[OrderLevel],
    bucket_width: Decimal,
) -> Result<Vec<PriceBand>, BandingError> {
    aggregate_buy_limited(buy_levels, bucket_width, DEFAULT_MAX_BUY_BANDS)
}

/// [`aggregate_buy`] with an explicit ceiling on the number of bands.
pub fn aggregate_buy_limited(
    buy_levels: &[OrderLevel],
    bucket_width: Decimal,
    max_bands: usize,
) -> Result<Vec<PriceBand>, BandingError> {
    check_width(bucket_width)?;
    let best_bid = match buy_levels.first() {
        Some(level) => level.price.as_decimal(),
        None => return Err(InputError::EmptySide { side: Side::BUY }.into()),
    };
    check_descending(Side::BUY, buy_levels)?;

    let required = best_bid
        .checked_div(bucket_width)
        .ok_or(InputError::GridOutOfRange {
            side: Side::BUY,
            price: best_bid,
            width: bucket_width,
        })?
        .ceil();
    if required > Decimal::from(max_bands) {
        return Err(InputError::GridTooFine {
            required,
            limit: max_bands,
        }
        .into());
    }

    let mut bands = Vec::new();
    let mut current = PriceBand::empty(Side::BUY, Decimal::ZERO, bucket_width.min(best_bid));

    // Lowest price first.
    for level in buy_levels.iter().rev() {
        let price = level.price.as_decimal();
        while price >= current.max_price && current.max_price < best_bid {
            let next_min = current.max_price;
            let next_max = next_min
                .checked_add(bucket_width)
                .map_or(best_bid, |max| max.min(best_bid));
            bands.push(std::mem::replace(
                &mut current,
                PriceBand::empty(Side::BUY, next_min, next_max),
            ));
        }
        current.volume += level.volume.as_decimal();
    }
    bands.push(current);

    debug!(
        levels = buy_levels.len(),
        bands = bands.len(),
        best_bid = %best_bid,
        width = %bucket_width,
        "Aggregated buy side"
    );

    Ok(bands)
}

/// Aggregate asks into at most [`MAX_SELL_BANDS`] bands.
///
/// `sell_levels` must be in ascending price order (best ask first). The
/// first band runs from the best ask to the first grid line
/// `start_boundary + k * bucket_width` above it.
pub fn aggregate_sell(
    sell_levels: &[OrderLevel],
    bucket_width: Decimal,
    start_boundary: Decimal,
) -> Result<SellBands, BandingError> {
    aggregate_sell_with(sell_levels, bucket_width, start_boundary, &SellPolicy::default())
}

/// [`aggregate_sell`] with explicit stopping rules.
pub fn aggregate_sell_with(
    sell_levels: &[OrderLevel],
    bucket_width: Decimal,
    start_boundary: Decimal,
    policy: &SellPolicy,
) -> Result<SellBands, BandingError> {
    check_width(bucket_width)?;
    if start_boundary.is_sign_negative() && !start_boundary.is_zero() {
        return Err(InputError::NegativeBoundary(start_boundary).into());
    }
    if policy.max_bands == 0 {
        return Err(InputError::Config("sell band cap must be positive".to_string()).into());
    }
    let best_ask = match sell_levels.first() {
        Some(level) => level.price.as_decimal(),
        None => return Err(InputError::EmptySide { side: Side::SELL }.into()),
    };
    check_ascending(Side::SELL, sell_levels)?;

    // A ceiling past Decimal::MAX is never reached.
    let ceiling = policy
        .ceiling_multiple
        .and_then(|multiple| best_ask.checked_mul(multiple));
    let out_of_range = |price: Decimal| InputError::GridOutOfRange {
        side: Side::SELL,
        price,
        width: bucket_width,
    };
    let first_max = first_grid_line_above(best_ask, start_boundary, bucket_width)
        .ok_or_else(|| out_of_range(best_ask))?;

    let mut bands = Vec::new();
    let mut current = PriceBand::empty(Side::SELL, best_ask, first_max);

    for (index, level) in sell_levels.iter().enumerate() {
        let price = level.price.as_decimal();
        while price >= current.max_price {
            let next_min = current.max_price;
            if let Some(reason) = policy.stop_reason(bands.len() + 1, next_min, ceiling) {
                bands.push(current);
                let remaining = &sell_levels[index..];
                let truncation = SellTruncation {
                    reason,
                    dropped_levels: remaining.len(),
                    dropped_volume: total_volume(remaining),
                    first_dropped_price: price,
                };
                warn!(
                    reason = ?truncation.reason,
                    bands = bands.len(),
                    dropped_levels = truncation.dropped_levels,
                    dropped_volume = %truncation.dropped_volume,
                    first_dropped_price = %truncation.first_dropped_price,
                    "Sell side truncated"
                );
                return Ok(SellBands {
                    bands,
                    truncation: Some(truncation),
                });
            }
            let next_max = next_min
                .checked_add(bucket_width)
                .filter(|max| *max > next_min)
                .ok_or_else(|| out_of_range(price))?;
            bands.push(std::mem::replace(
                &mut current,
                PriceBand::empty(Side::SELL, next_min, next_max),
            ));
        }
        current.volume += level.volume.as_decimal();
    }
    bands.push(current);

    debug!(
        levels = sell_levels.len(),
        bands = bands.len(),
        best_ask = %best_ask,
        width = %bucket_width,
        "Aggregated sell side"
    );

    Ok(SellBands {
        bands,
        truncation: None,
    })
}

/// The grid line that closes the buy grid, where the sell grid is anchored.
///
/// For a grid whose last band was capped at the best bid this is the
/// uncapped line one width above the last band's floor. `None` when there
/// are no bands or the line overflows.
pub fn buy_grid_terminal(buy_bands: &[PriceBand], bucket_width: Decimal) -> Option<Decimal> {
    buy_bands
        .last()
        .and_then(|band| band.min_price.checked_add(bucket_width))
}

/// Smallest `start + k * width` (any integer `k`) strictly above `price`.
///
/// `None` when the line is not representable: the step count overflows, or
/// `width` vanishes next to `price` in 28 significant digits.
fn first_grid_line_above(price: Decimal, start: Decimal, width: Decimal) -> Option<Decimal> {
    let steps = price.checked_sub(start)?.checked_div(width)?.floor();
    let mut line = steps
        .checked_add(Decimal::ONE)?
        .checked_mul(width)?
        .checked_add(start)?;
    // Division rounding can leave the estimate one step off.
    while line <= price {
        let next = line.checked_add(width)?;
        if next <= line {
            return None;
        }
        line = next;
    }
    while let Some(lower) = line.checked_sub(width).filter(|lower| *lower > price) {
        if lower >= line {
            return None;
        }
        line = lower;
    }
    Some(line)
}

fn check_width(bucket_width: Decimal) -> Result<(), InputError> {
    if bucket_width <= Decimal::ZERO {
        return Err(InputError::NonPositiveWidth(bucket_width));
    }
    Ok(())
}
