//! Portfolio state and valuation.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::trade::{Side, Trade};

/// One point of the daily NAV series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NavPoint {
    pub date: NaiveDate,
    #[serde(rename = "nav")]
    pub value: f64,
}

/// Prices for one date. `None` means the price is unavailable.
///
/// Zero, negative and non-finite prices are invalid and are never handed
/// out by [`PriceQuote::get`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceQuote {
    prices: HashMap<String, Option<f64>>,
}

impl PriceQuote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, price: Option<f64>) {
        self.prices.insert(symbol.into(), price);
    }

    /// Builder-style insert of a known price.
    pub fn with(mut self, symbol: &str, price: f64) -> Self {
        self.insert(symbol, Some(price));
        self
    }

    /// Builder-style insert of an unavailable price.
    pub fn with_missing(mut self, symbol: &str) -> Self {
        self.insert(symbol, None);
        self
    }

    /// The valid price for `symbol`, if any.
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.prices
            .get(symbol)
            .copied()
            .flatten()
            .filter(|p| p.is_finite() && *p > 0.0)
    }

    /// True when no symbol has a valid price.
    pub fn has_no_valid_price(&self) -> bool {
        !self.prices.keys().any(|s| self.get(s).is_some())
    }

    /// A copy containing only the valid prices.
    pub fn valid_only(&self) -> PriceQuote {
        let prices = self
            .prices
            .keys()
            .filter_map(|s| self.get(s).map(|p| (s.clone(), Some(p))))
            .collect();
        PriceQuote { prices }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl FromIterator<(String, Option<f64>)> for PriceQuote {
    fn from_iter<I: IntoIterator<Item = (String, Option<f64>)>>(iter: I) -> Self {
        PriceQuote {
            prices: iter.into_iter().collect(),
        }
    }
}

/// Cash plus whole-share positions. Positions are kept in symbol order so
/// every pass over them is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    pub positions: BTreeMap<String, u64>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            positions: BTreeMap::new(),
        }
    }

    pub fn quantity(&self, symbol: &str) -> u64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    /// Sets the holding for `symbol`, dropping the entry at zero.
    pub fn set_quantity(&mut self, symbol: &str, quantity: u64) {
        if quantity == 0 {
            self.positions.remove(symbol);
        } else {
            self.positions.insert(symbol.to_string(), quantity);
        }
    }

    /// Books a fill: cash moves by the trade's cash flow and the holding
    /// grows or shrinks by its quantity.
    pub fn apply(&mut self, trade: &Trade) {
        self.cash += trade.cash_flow();
        let held = self.quantity(&trade.symbol);
        let quantity = match trade.side {
            Side::Buy => held + trade.quantity,
            Side::Sell => held.saturating_sub(trade.quantity),
        };
        self.set_quantity(&trade.symbol, quantity);
    }

    /// Market value of one holding, or 0 when the price is unknown.
    pub fn position_value(&self, symbol: &str, prices: &PriceQuote) -> f64 {
        prices
            .get(symbol)
            .map_or(0.0, |price| self.quantity(symbol) as f64 * price)
    }

    /// Cash plus every holding with a known price. Unpriced holdings count
    /// as zero.
    pub fn total_value(&self, prices: &PriceQuote) -> f64 {
        let position_value: f64 = self
            .positions
            .iter()
            .filter_map(|(symbol, &qty)| prices.get(symbol).map(|price| qty as f64 * price))
            .sum();
        self.cash + position_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn new_portfolio() {
        let portfolio = Portfolio::new(1_000_000.0);
        assert_relative_eq!(portfolio.cash, 1_000_000.0);
        assert_relative_eq!(portfolio.initial_cash, 1_000_000.0);
        assert!(portfolio.positions.is_empty());
    }

    #[test]
    fn zero_quantity_removes_position() {
        let mut portfolio = Portfolio::new(0.0);
        portfolio.set_quantity("0700.HK", 200);
        assert!(portfolio.has_position("0700.HK"));
        assert_eq!(portfolio.quantity("0700.HK"), 200);

        portfolio.set_quantity("0700.HK", 0);
        assert!(!portfolio.has_position("0700.HK"));
        assert!(portfolio.symbols().is_empty());
    }

    #[test]
    fn apply_books_cash_and_quantity() {
        let mut portfolio = Portfolio::new(100_000.0);
        let mut fill = Trade {
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            side: Side::Buy,
            symbol: "0005.HK".into(),
            quantity: 400,
            price: 62.5,
            cost: 100.0,
        };
        portfolio.apply(&fill);
        assert_relative_eq!(portfolio.cash, 74_900.0);
        assert_eq!(portfolio.quantity("0005.HK"), 400);

        fill.side = Side::Sell;
        fill.quantity = 400;
        portfolio.apply(&fill);
        assert_relative_eq!(portfolio.cash, 99_800.0);
        assert!(!portfolio.has_position("0005.HK"));
    }

    #[test]
    fn symbols_are_sorted() {
        let mut portfolio = Portfolio::new(0.0);
        portfolio.set_quantity("C", 1);
        portfolio.set_quantity("A", 1);
        portfolio.set_quantity("B", 1);
        assert_eq!(portfolio.symbols(), vec!["A", "B", "C"]);
    }

    #[test]
    fn total_value_no_positions() {
        let portfolio = Portfolio::new(100_000.0);
        assert_relative_eq!(portfolio.total_value(&PriceQuote::new()), 100_000.0);
    }

    #[test]
    fn total_value_marks_positions() {
        let mut portfolio = Portfolio::new(40_000.0);
        portfolio.set_quantity("A", 100);
        portfolio.set_quantity("B", 10);
        let prices = PriceQuote::new().with("A", 150.0).with("B", 20.0);
        assert_relative_eq!(portfolio.total_value(&prices), 55_200.0);
    }

    #[test]
    fn unknown_price_contributes_zero() {
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.set_quantity("A", 100);
        portfolio.set_quantity("B", 100);
        let prices = PriceQuote::new().with("A", 2.0).with_missing("B");
        assert_relative_eq!(portfolio.total_value(&prices), 1_200.0);
    }

    #[test]
    fn zero_price_is_rejected() {
        let prices = PriceQuote::new().with("A", 0.0).with("B", -1.0).with("C", f64::NAN);
        assert_eq!(prices.get("A"), None);
        assert_eq!(prices.get("B"), None);
        assert_eq!(prices.get("C"), None);
        assert!(prices.has_no_valid_price());
        assert!(prices.valid_only().is_empty());
    }

    #[test]
    fn valid_only_keeps_positive_prices() {
        let prices = PriceQuote::new().with("A", 10.0).with_missing("B");
        let valid = prices.valid_only();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid.get("A"), Some(10.0));
    }

    proptest! {
        #[test]
        fn total_value_at_least_cash(
            cash in 0.0f64..1e9,
            holdings in proptest::collection::vec((1u64..100_000, 0.01f64..10_000.0), 0..20),
        ) {
            let mut portfolio = Portfolio::new(cash);
            let mut prices = PriceQuote::new();
            for (i, (qty, price)) in holdings.iter().enumerate() {
                let symbol = format!("S{i}");
                portfolio.set_quantity(&symbol, *qty);
                prices.insert(symbol, Some(*price));
            }
            prop_assert!(portfolio.total_value(&prices) >= portfolio.cash);
        }
    }
}
