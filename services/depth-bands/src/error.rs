//! Error taxonomy for the banding engine
//!
//! Every failure is reported synchronously to the caller. Sell-side
//! truncation is not an error; see [`crate::bands::SellTruncation`].

use rust_decimal::Decimal;
use thiserror::Error;
use types::order::Side;

/// Top-level banding error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BandingError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("Degenerate grid scale: max buy price {max_buy_price} leaves no width spread")]
    DegenerateScale { max_buy_price: Decimal },
}

/// Input validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("max buy price must be positive, got {0}")]
    NonPositiveMaxPrice(Decimal),

    #[error("bucket width must be positive, got {0}")]
    NonPositiveWidth(Decimal),

    #[error("{side} side has no levels")]
    EmptySide { side: Side },

    #[error("{side} levels out of order at index {index}: {price} follows {previous}")]
    Unsorted {
        side: Side,
        index: usize,
        previous: Decimal,
        price: Decimal,
    },

    #[error("start boundary must not be negative, got {0}")]
    NegativeBoundary(Decimal),

    #[error("grid too fine: {required} bands needed, limit is {limit}")]
    GridTooFine { required: Decimal, limit: usize },

    #[error("{side} grid of width {width} cannot reach {price} within decimal precision")]
    GridOutOfRange {
        side: Side,
        price: Decimal,
        width: Decimal,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}
