//! Error types for shared primitives
//!
//! Construction failures for the decimal newtypes and identifiers.

use thiserror::Error;

/// Numeric construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("Invalid price: {0} (must be positive)")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0} (must not be negative)")]
    InvalidQuantity(String),

    #[error("Unparseable decimal: {0}")]
    Parse(String),
}
