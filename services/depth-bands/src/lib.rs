//! Depth Bands Service
//!
//! Condenses a sampled order book into fixed-width price bands:
//! - Bucket width derived from the best bid (about 100 buy bands)
//! - Buy bands partitioning `[0, best_bid]`, gaps included
//! - Sell bands aligned to the buy grid, capped at 127 bands
//! - Snapshots paired with the open candle, checksummed and stored
//!
//! # Architecture
//!
//! ```text
//!  Book / Candles / Ticker payloads
//!            │
//!       ┌────▼───┐
//!       │  Wire  │  ← Decodes, validates side ordering
//!       └────┬───┘
//!            │
//!       ┌────▼───┐
//!       │  Grid  │  ← Bucket width from best bid
//!       └────┬───┘
//!            │
//!    ┌───────┴────────┐
//!    │                │
//! ┌──▼───┐   start ┌──▼───┐
//! │ Buys │ ───────▶│Sells │  ← Capped, truncation reported
//! └──┬───┘         └──┬───┘
//!    │                │
//! ┌──▼────────────────▼──┐
//! │  Snapshot + Candle   │  ← Checksum, sequence
//! └──────────┬───────────┘
//!            │
//!       ┌────▼───┐
//!       │  Sink  │
//!       └────────┘
//! ```

pub mod bands;
pub mod book;
pub mod candles;
pub mod config;
pub mod error;
pub mod grid;
pub mod metrics;
pub mod pipeline;
pub mod snapshot;
pub mod wire;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
