//! Book side types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Book side (resting buyers or resting sellers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy side (bids)
    BUY,
    /// Sell side (asks)
    SELL,
}

impl Side {
    /// Lowercase label used by storage rows ("buy" / "sell").
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::BUY => "buy",
            Side::SELL => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
