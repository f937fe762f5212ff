//! Grid sizer
//!
//! Derives one bucket width per snapshot from the highest bid. The width
//! splits `[0, max_buy_price]` into roughly `target_bands` bands and is
//! rounded up to a power-of-ten granularity picked from the price itself:
//! cents for low prices, whole units or tens for high ones.
//!
//! The granularity comes from how far the width moves when the band count
//! changes by one (`max / (target - 1) - max / target`). That spread is
//! brought into a single decade by a power of ten, computed in closed form
//! from the decimal's mantissa and scale.

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{BandingError, InputError};

/// Band count the production grid aims for.
pub const DEFAULT_TARGET_BANDS: u32 = 100;

/// Bucket width for about 100 buy bands.
pub fn compute_bucket_width(max_buy_price: Decimal) -> Result<Decimal, BandingError> {
    bucket_width_for(max_buy_price, DEFAULT_TARGET_BANDS)
}

/// Bucket width for about `target_bands` buy bands.
///
/// The result is never below `max_buy_price / target_bands`.
pub fn bucket_width_for(max_buy_price: Decimal, target_bands: u32) -> Result<Decimal, BandingError> {
    if max_buy_price <= Decimal::ZERO {
        return Err(InputError::NonPositiveMaxPrice(max_buy_price).into());
    }
    if target_bands < 2 {
        return Err(InputError::Config(format!(
            "target_bands must be at least 2, got {target_bands}"
        ))
        .into());
    }

    let degenerate = || BandingError::DegenerateScale { max_buy_price };

    let raw_width = max_buy_price / Decimal::from(target_bands);
    let wider = max_buy_price / Decimal::from(target_bands - 1);
    let spread = wider - raw_width;
    if spread <= Decimal::ZERO || raw_width <= Decimal::ZERO {
        return Err(degenerate());
    }

    let scale = rounding_scale(spread).ok_or_else(degenerate)?;
    let width = ((raw_width / scale).ceil() * scale).normalize();

    debug!(
        max_buy_price = %max_buy_price,
        target_bands,
        spread = %spread,
        scale = %scale,
        width = %width,
        "Computed bucket width"
    );

    Ok(width)
}

/// Power of ten that brings `spread` into one decade.
///
/// Above one the spread lands in `(1, 10]`, at or below one in `[1, 10)`,
/// so an exact power of ten above one keeps the next smaller scale.
fn rounding_scale(spread: Decimal) -> Option<Decimal> {
    let (exponent, exact) = decimal_exponent(spread);
    let exponent = if exact && spread > Decimal::ONE {
        exponent - 1
    } else {
        exponent
    };
    pow10(exponent)
}

/// `floor(log10(value))` for a positive decimal, and whether `value` is an
/// exact power of ten.
fn decimal_exponent(value: Decimal) -> (i32, bool) {
    let mantissa = value.mantissa().unsigned_abs();
    let digits = mantissa.ilog10();
    let exact = mantissa == 10u128.pow(digits);
    (digits as i32 - value.scale() as i32, exact)
}

fn pow10(exponent: i32) -> Option<Decimal> {
    if exponent >= 0 {
        let power = 10i128.checked_pow(exponent.unsigned_abs())?;
        Decimal::try_from_i128_with_scale(power, 0).ok()
    } else {
        Decimal::try_from_i128_with_scale(1, exponent.unsigned_abs()).ok()
    }
}
