//! Exchange REST payload decoding
//!
//! Decodes the book, candle and ticker payloads into the service's types.
//! No transport: the caller fetches the bytes.
//!
//! Book payload:
//! ```json
//! {
//!   "bids": [["price", "size", num_orders], ...],
//!   "asks": [["price", "size", num_orders], ...],
//!   "sequence": 3,
//!   "auction_mode": false,
//!   "auction": null,
//!   "time": "2024-02-16T21:50:00.123Z"
//! }
//! ```
//! Only `bids`, `asks` and `sequence` are read; the exchange clock comes from
//! the ticker. In the full (per-order) book the third element is an order id
//! string and the entry counts as one order.
//!
//! Candles: `[[time, low, high, open, close, volume], ...]`, newest first.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer};
use thiserror::Error;
use types::numeric::{Price, Quantity};

use crate::book::{BookLevels, OrderLevel};
use crate::candles::CandleSummary;
use crate::error::InputError;

/// Payload decoding failures.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid book: {0}")]
    Book(#[from] InputError),
}

/// Order book payload.
#[derive(Debug, Clone, Deserialize)]
pub struct BookPayload {
    pub bids: Vec<WireLevel>,
    pub asks: Vec<WireLevel>,
    pub sequence: i64,
}

impl BookPayload {
    /// Convert into book levels, checking the side ordering.
    pub fn into_book(self) -> Result<BookLevels, WireError> {
        let bids = self.bids.into_iter().map(OrderLevel::from).collect();
        let asks = self.asks.into_iter().map(OrderLevel::from).collect();
        Ok(BookLevels::new(bids, asks, self.sequence)?)
    }
}

/// Book level: `["price", "size", num_orders | "order_id"]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireLevel {
    pub price: Price,
    pub volume: Quantity,
    pub count: u32,
}

impl<'de> Deserialize<'de> for WireLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (price, size, orders): (String, String, serde_json::Value) =
            Deserialize::deserialize(deserializer)?;

        let count = match orders {
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| de::Error::custom(format!("invalid order count: {n}")))?,
            serde_json::Value::String(_) => 1,
            other => return Err(de::Error::custom(format!("unexpected level entry: {other}"))),
        };

        Ok(WireLevel {
            price: Price::from_str(&price).map_err(de::Error::custom)?,
            volume: Quantity::from_str(&size).map_err(de::Error::custom)?,
            count,
        })
    }
}

impl From<WireLevel> for OrderLevel {
    fn from(level: WireLevel) -> Self {
        OrderLevel::new(level.price, level.volume, level.count)
    }
}

/// Candle row: `[time, low, high, open, close, volume]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireCandle(pub CandleSummary);

impl<'de> Deserialize<'de> for WireCandle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        type Row = (
            serde_json::Number,
            serde_json::Number,
            serde_json::Number,
            serde_json::Number,
            serde_json::Number,
            serde_json::Number,
        );
        let (time, low, high, open, close, volume): Row = Deserialize::deserialize(deserializer)?;

        let open_time = time
            .as_i64()
            .or_else(|| time.as_f64().and_then(whole_seconds))
            .ok_or_else(|| de::Error::custom(format!("invalid candle time: {time}")))?;

        Ok(WireCandle(CandleSummary {
            open_time,
            low: number_to_decimal(&low).map_err(de::Error::custom)?,
            high: number_to_decimal(&high).map_err(de::Error::custom)?,
            open: number_to_decimal(&open).map_err(de::Error::custom)?,
            close: number_to_decimal(&close).map_err(de::Error::custom)?,
            volume: number_to_decimal(&volume).map_err(de::Error::custom)?,
        }))
    }
}

/// Ticker payload; only the exchange clock is used.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPayload {
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub price: Option<String>,
}

impl TickerPayload {
    /// Exchange time in unix seconds.
    pub fn unix_secs(&self) -> i64 {
        self.time.timestamp()
    }
}

pub fn parse_book(json: &str) -> Result<BookLevels, WireError> {
    let payload: BookPayload = serde_json::from_str(json)?;
    payload.into_book()
}

pub fn parse_candles(json: &str) -> Result<Vec<CandleSummary>, WireError> {
    let rows: Vec<WireCandle> = serde_json::from_str(json)?;
    Ok(rows.into_iter().map(|row| row.0).collect())
}

pub fn parse_ticker(json: &str) -> Result<TickerPayload, WireError> {
    Ok(serde_json::from_str(json)?)
}

/// Candle times sometimes arrive as floats (`1708120200.0`).
fn whole_seconds(t: f64) -> Option<i64> {
    if t.fract() == 0.0 && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Some(t as i64)
    } else {
        None
    }
}

/// Decimal from the number's shortest round-trip text. Values beyond 15
/// significant digits carry the f64 rounding of the payload.
fn number_to_decimal(n: &serde_json::Number) -> Result<Decimal, String> {
    let s = n.to_string();
    Decimal::from_str(&s)
        .or_else(|_| Decimal::from_scientific(&s))
        .map_err(|e| format!("{s}: {e}"))
}
