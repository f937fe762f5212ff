//! Order book levels as delivered by the market-data source
//!
//! Ordering convention, validated on construction:
//! - Bids in descending price order (best bid first).
//! - Asks in ascending price order (best ask first).
//!
//! Repeated prices are allowed (a full book lists each order separately).

use std::cmp::Reverse;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::numeric::{Price, Quantity};
use types::order::Side;

use crate::error::InputError;

/// A single price level in the order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLevel {
    /// The price of this level.
    pub price: Price,
    /// Total resting quantity at this level.
    pub volume: Quantity,
    /// Number of orders resting at this level. Informational only.
    pub count: u32,
}

impl OrderLevel {
    pub fn new(price: Price, volume: Quantity, count: u32) -> Self {
        Self {
            price,
            volume,
            count,
        }
    }
}

/// Both sides of one order book sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedBook")]
pub struct BookLevels {
    /// Bids in descending price order (best first).
    bids: Vec<OrderLevel>,
    /// Asks in ascending price order (best first).
    asks: Vec<OrderLevel>,
    /// Exchange sequence number of the sample.
    pub sequence: i64,
}

/// Serialized form, validated through [`BookLevels::new`].
#[derive(Deserialize)]
struct UncheckedBook {
    bids: Vec<OrderLevel>,
    asks: Vec<OrderLevel>,
    sequence: i64,
}

impl TryFrom<UncheckedBook> for BookLevels {
    type Error = InputError;

    fn try_from(book: UncheckedBook) -> Result<Self, Self::Error> {
        Self::new(book.bids, book.asks, book.sequence)
    }
}

impl BookLevels {
    /// Wrap already sorted levels, rejecting either side if out of order.
    pub fn new(
        bids: Vec<OrderLevel>,
        asks: Vec<OrderLevel>,
        sequence: i64,
    ) -> Result<Self, InputError> {
        check_descending(Side::BUY, &bids)?;
        check_ascending(Side::SELL, &asks)?;
        Ok(Self {
            bids,
            asks,
            sequence,
        })
    }

    /// Sort arbitrary levels into the book convention.
    pub fn sorted(mut bids: Vec<OrderLevel>, mut asks: Vec<OrderLevel>, sequence: i64) -> Self {
        bids.sort_by_key(|level| Reverse(level.price));
        asks.sort_by_key(|level| level.price);
        Self {
            bids,
            asks,
            sequence,
        }
    }

    /// Bid levels (descending price order).
    pub fn bids(&self) -> &[OrderLevel] {
        &self.bids
    }

    /// Ask levels (ascending price order).
    pub fn asks(&self) -> &[OrderLevel] {
        &self.asks
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|level| level.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|level| level.price)
    }

    /// Get the spread between best ask and best bid.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.as_decimal() - bid.as_decimal()),
            _ => None,
        }
    }

    /// Total resting volume on one side.
    pub fn total_volume(&self, side: Side) -> Decimal {
        let levels = match side {
            Side::BUY => &self.bids,
            Side::SELL => &self.asks,
        };
        total_volume(levels)
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Sum of level volumes.
pub fn total_volume(levels: &[OrderLevel]) -> Decimal {
    levels.iter().map(|level| level.volume.as_decimal()).sum()
}

/// Reject levels that are not in non-increasing price order.
pub(crate) fn check_descending(side: Side, levels: &[OrderLevel]) -> Result<(), InputError> {
    check_order(side, levels, |previous, price| price <= previous)
}

/// Reject levels that are not in non-decreasing price order.
pub(crate) fn check_ascending(side: Side, levels: &[OrderLevel]) -> Result<(), InputError> {
    check_order(side, levels, |previous, price| price >= previous)
}

fn check_order(
    side: Side,
    levels: &[OrderLevel],
    in_order: impl Fn(Price, Price) -> bool,
) -> Result<(), InputError> {
    for (index, pair) in levels.windows(2).enumerate() {
        let (previous, current) = (pair[0].price, pair[1].price);
        if !in_order(previous, current) {
            return Err(InputError::Unsorted {
                side,
                index: index + 1,
                previous: previous.as_decimal(),
                price: current.as_decimal(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: u64, volume: &str) -> OrderLevel {
        OrderLevel::new(Price::from_u64(price), Quantity::from_str(volume).unwrap(), 1)
    }

    #[test]
    fn test_new_accepts_book_convention() {
        let book = BookLevels::new(
            vec![level(100, "1"), level(99, "2"), level(99, "0.5")],
            vec![level(101, "1"), level(102, "3")],
            7,
        )
        .unwrap();

        assert_eq!(book.best_bid(), Some(Price::from_u64(100)));
        assert_eq!(book.best_ask(), Some(Price::from_u64(101)));
        assert_eq!(book.spread(), Some(Decimal::ONE));
        assert_eq!(book.total_volume(Side::BUY), Decimal::from_str_exact("3.5").unwrap());
        assert_eq!(book.total_volume(Side::SELL), Decimal::from(4));
    }

    #[test]
    fn test_new_rejects_ascending_bids() {
        let err = BookLevels::new(vec![level(99, "1"), level(100, "1")], vec![], 1).unwrap_err();
        assert_eq!(
            err,
            InputError::Unsorted {
                side: Side::BUY,
                index: 1,
                previous: Decimal::from(99),
                price: Decimal::from(100),
            }
        );
    }

    #[test]
    fn test_new_rejects_descending_asks() {
        let err = BookLevels::new(
            vec![level(100, "1")],
            vec![level(101, "1"), level(103, "1"), level(102, "1")],
            1,
        )
        .unwrap_err();
        assert!(matches!(err, InputError::Unsorted { side: Side::SELL, index: 2, .. }));
    }

    #[test]
    fn test_sorted_orders_both_sides() {
        let book = BookLevels::sorted(
            vec![level(98, "1"), level(100, "1"), level(99, "1")],
            vec![level(103, "1"), level(101, "1")],
            1,
        );
        let bid_prices: Vec<String> = book.bids().iter().map(|l| l.price.to_string()).collect();
        assert_eq!(bid_prices, vec!["100", "99", "98"]);
        assert_eq!(book.best_ask(), Some(Price::from_u64(101)));
    }

    #[test]
    fn test_empty_book() {
        let book = BookLevels::new(vec![], vec![], 0).unwrap();
        assert!(book.is_empty());
        assert!(book.best_bid().is_none());
        assert!(book.spread().is_none());
        assert_eq!(book.total_volume(Side::SELL), Decimal::ZERO);
    }

    #[test]
    fn test_book_serialization() {
        let book = BookLevels::new(vec![level(100, "1.25")], vec![level(101, "2")], 9).unwrap();
        let json = serde_json::to_string(&book).unwrap();
        let deserialized: BookLevels = serde_json::from_str(&json).unwrap();
        assert_eq!(book, deserialized);
    }

    #[test]
    fn test_book_deserialization_checks_order() {
        let json = r#"{
            "bids": [
                { "price": "99", "volume": "1", "count": 1 },
                { "price": "100", "volume": "1", "count": 1 }
            ],
            "asks": [],
            "sequence": 4
        }"#;
        let err = serde_json::from_str::<BookLevels>(json).unwrap_err();
        assert!(err.to_string().contains("out of order"), "{err}");
    }
}
