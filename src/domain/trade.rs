//! Executed trade records.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A fill produced by the rebalancer. `cost` is the transaction fee.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub side: Side,
    pub symbol: String,
    #[serde(rename = "qty")]
    pub quantity: u64,
    pub price: f64,
    pub cost: f64,
}

impl Trade {
    pub fn gross_value(&self) -> f64 {
        self.quantity as f64 * self.price
    }

    /// Signed cash effect: negative for buys, positive for sells.
    pub fn cash_flow(&self) -> f64 {
        match self.side {
            Side::Buy => -(self.gross_value() + self.cost),
            Side::Sell => self.gross_value() - self.cost,
        }
    }
}
