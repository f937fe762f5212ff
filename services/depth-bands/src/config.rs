//! Banding configuration
//!
//! All fields have defaults matching the production grid: about 100 buy
//! bands, at most 127 sell bands, five minute candles.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bands::{SellPolicy, MAX_SELL_BANDS};
use crate::candles::Timeframe;
use crate::error::InputError;

/// Configuration for grid sizing, aggregation limits, and candle pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandingConfig {
    /// Number of buy bands the grid sizer aims for.
    pub target_bands: u32,
    /// Hard cap on emitted sell bands (1..=127).
    pub max_sell_bands: usize,
    /// Optional stop for the sell grid, as a multiple of the lowest ask.
    pub sell_ceiling_multiple: Option<Decimal>,
    /// Largest buy grid an explicit width may request.
    pub max_buy_bands: usize,
    /// Candle granularity used to pair a candle with the book.
    pub candle_granularity: Timeframe,
}

impl Default for BandingConfig {
    fn default() -> Self {
        Self {
            target_bands: 100,
            max_sell_bands: MAX_SELL_BANDS,
            sell_ceiling_multiple: None,
            max_buy_bands: 100_000,
            candle_granularity: Timeframe::M5,
        }
    }
}

impl BandingConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// Decimal fields are written as strings (`"5"`), as everywhere else in
    /// the service.
    pub fn from_json(json: &str) -> Result<Self, InputError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| InputError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if self.target_bands < 2 {
            return Err(InputError::Config(format!(
                "target_bands must be at least 2, got {}",
                self.target_bands
            )));
        }
        if self.max_sell_bands == 0 || self.max_sell_bands > MAX_SELL_BANDS {
            return Err(InputError::Config(format!(
                "max_sell_bands must be within 1..={MAX_SELL_BANDS}, got {}",
                self.max_sell_bands
            )));
        }
        if let Some(multiple) = self.sell_ceiling_multiple {
            if multiple <= Decimal::ONE {
                return Err(InputError::Config(format!(
                    "sell_ceiling_multiple must exceed 1, got {multiple}"
                )));
            }
        }
        if self.max_buy_bands == 0 {
            return Err(InputError::Config("max_buy_bands must be positive".to_string()));
        }
        Ok(())
    }

    /// Sell-side stopping rules derived from this configuration.
    pub fn sell_policy(&self) -> SellPolicy {
        SellPolicy {
            max_bands: self.max_sell_bands,
            ceiling_multiple: self.sell_ceiling_multiple,
        }
    }
}
