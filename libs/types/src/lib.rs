//! Types library for order-book depth banding
//!
//! Shared primitives used by the banding service and its collaborators.
//!
//! # Modules
//! - `ids`: Identifiers (MarketId, SnapshotId)
//! - `numeric`: Fixed-point decimal types (Price, Quantity)
//! - `order`: Book side
//! - `errors`: Construction errors

pub mod ids;
pub mod numeric;
pub mod order;
pub mod errors;

