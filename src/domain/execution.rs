//! Equal-weight rebalancing and fill simulation.
//!
//! Moves a portfolio toward equal weight across the tradable target
//! symbols, charging proportional fees, rounding to whole lots and leaving
//! symbols without a usable price untouched for the cycle.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::error::NavtraderError;
use super::portfolio::{Portfolio, PriceQuote};
use super::trade::{Side, Trade};

/// Which daily price fills are executed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPrice {
    #[default]
    Open,
    Close,
}

impl FromStr for ExecutionPrice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" | "next_open" => Ok(ExecutionPrice::Open),
            "close" => Ok(ExecutionPrice::Close),
            other => Err(format!("unknown execution price '{other}' (expected open or close)")),
        }
    }
}

impl fmt::Display for ExecutionPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPrice::Open => write!(f, "open"),
            ExecutionPrice::Close => write!(f, "close"),
        }
    }
}

/// Cost and sizing parameters for the rebalancer.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceConfig {
    pub fee_rate_buy: f64,
    pub fee_rate_sell: f64,
    /// Fraction of the per-symbol allocation below which a trade is skipped.
    pub min_trade_ratio: f64,
    pub lot_size: u64,
    pub execution_price: ExecutionPrice,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        RebalanceConfig {
            fee_rate_buy: 0.004,
            fee_rate_sell: 0.004,
            min_trade_ratio: 0.005,
            lot_size: 1,
            execution_price: ExecutionPrice::Open,
        }
    }
}

impl RebalanceConfig {
    pub fn validate(&self) -> Result<(), NavtraderError> {
        check_rate("fee_rate_buy", self.fee_rate_buy)?;
        check_rate("fee_rate_sell", self.fee_rate_sell)?;
        check_rate("min_trade_ratio", self.min_trade_ratio)?;
        if self.lot_size == 0 {
            return Err(NavtraderError::invalid(
                "execution",
                "lot_size",
                "lot_size must be at least 1",
            ));
        }
        Ok(())
    }

    /// Largest whole-lot quantity not exceeding `shares`.
    fn whole_lots(&self, shares: f64) -> u64 {
        if !shares.is_finite() || shares <= 0.0 {
            return 0;
        }
        let lots = (shares / self.lot_size as f64).floor() as u64;
        lots * self.lot_size
    }
}

fn check_rate(key: &str, value: f64) -> Result<(), NavtraderError> {
    if !(0.0..1.0).contains(&value) {
        return Err(NavtraderError::invalid(
            "execution",
            key,
            format!("{key} must be in [0, 1), got {value}"),
        ));
    }
    Ok(())
}

/// Counters from the most recent rebalance call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RebalanceDiagnostics {
    pub target_count: usize,
    pub tradable_targets: usize,
    pub locked_targets: usize,
    pub locked_sells: usize,
    pub buys: usize,
    pub sells: usize,
    pub locked_target_symbols: Vec<String>,
    pub locked_sell_symbols: Vec<String>,
}

pub struct Rebalancer {
    config: RebalanceConfig,
    last_diagnostics: RebalanceDiagnostics,
}

impl Rebalancer {
    pub fn new(config: RebalanceConfig) -> Self {
        Rebalancer {
            config,
            last_diagnostics: RebalanceDiagnostics::default(),
        }
    }

    pub fn config(&self) -> &RebalanceConfig {
        &self.config
    }

    pub fn last_diagnostics(&self) -> &RebalanceDiagnostics {
        &self.last_diagnostics
    }

    /// Rebalances using the same-day prices as the valuation basis.
    pub fn rebalance(
        &mut self,
        date: NaiveDate,
        targets: &[String],
        prices: &PriceQuote,
        portfolio: &mut Portfolio,
    ) -> Vec<Trade> {
        self.rebalance_with_basis(date, targets, prices, None, portfolio)
    }

    /// Rebalances `portfolio` toward equal weight over `targets`.
    ///
    /// `prices` are the execution prices for `date`. `basis` holds the
    /// previous session's closes used to size allocations; when it is
    /// absent or carries no valid price the valid execution prices are
    /// used instead.
    ///
    /// Trades come back in execution order: liquidations of non-targets in
    /// symbol order, then per-target adjustments in target order.
    pub fn rebalance_with_basis(
        &mut self,
        date: NaiveDate,
        targets: &[String],
        prices: &PriceQuote,
        basis: Option<&PriceQuote>,
        portfolio: &mut Portfolio,
    ) -> Vec<Trade> {
        let fallback;
        let basis: &PriceQuote = match basis {
            Some(b) if !b.has_no_valid_price() => b,
            _ => {
                fallback = prices.valid_only();
                &fallback
            }
        };

        let mut seen = HashSet::new();
        let targets: Vec<&str> = targets
            .iter()
            .map(String::as_str)
            .filter(|s| seen.insert(*s))
            .collect();
        let target_set: HashSet<&str> = targets.iter().copied().collect();

        let (tradable, locked): (Vec<&str>, Vec<&str>) =
            targets.iter().copied().partition(|s| prices.get(s).is_some());

        let locked_sells: Vec<String> = portfolio
            .positions
            .keys()
            .filter(|s| !target_set.contains(s.as_str()) && prices.get(s).is_none())
            .cloned()
            .collect();

        let mut diag = RebalanceDiagnostics {
            target_count: targets.len(),
            tradable_targets: tradable.len(),
            locked_targets: locked.len(),
            locked_sells: locked_sells.len(),
            locked_target_symbols: locked.iter().map(|s| s.to_string()).collect(),
            locked_sell_symbols: locked_sells.clone(),
            ..Default::default()
        };

        let portfolio_value = portfolio.total_value(basis);
        let locked_value: f64 = locked
            .iter()
            .copied()
            .chain(locked_sells.iter().map(String::as_str))
            .map(|s| portfolio.position_value(s, basis))
            .sum();
        let allocation_base = (portfolio_value - locked_value).max(0.0);
        let per_symbol = allocation_base / tradable.len().max(1) as f64;

        if !locked.is_empty() || !locked_sells.is_empty() {
            debug!(
                %date,
                locked_targets = ?diag.locked_target_symbols,
                locked_sells = ?diag.locked_sell_symbols,
                locked_value,
                "symbols locked for this cycle"
            );
        }

        let mut trades = Vec::new();

        for symbol in portfolio.symbols() {
            if target_set.contains(symbol.as_str()) {
                continue;
            }
            let Some(price) = prices.get(&symbol) else {
                continue;
            };
            let quantity = portfolio.quantity(&symbol);
            let cost = quantity as f64 * price * self.config.fee_rate_sell;
            let trade = Trade {
                date,
                side: Side::Sell,
                symbol,
                quantity,
                price,
                cost,
            };
            portfolio.apply(&trade);
            diag.sells += 1;
            trades.push(trade);
        }

        for symbol in tradable {
            let Some(price) = prices.get(symbol) else {
                continue;
            };
            let held = portfolio.quantity(symbol);
            let diff = per_symbol - held as f64 * price;

            if diff.abs() < per_symbol * self.config.min_trade_ratio {
                continue;
            }

            if diff > 0.0 {
                let Some(trade) = self.buy(date, symbol, diff / price, price, portfolio) else {
                    continue;
                };
                diag.buys += 1;
                trades.push(trade);
            } else if diff < 0.0 {
                let quantity = self.config.whole_lots(-diff / price).min(held);
                if quantity == 0 {
                    continue;
                }
                let cost = quantity as f64 * price * self.config.fee_rate_sell;
                let trade = Trade {
                    date,
                    side: Side::Sell,
                    symbol: symbol.to_string(),
                    quantity,
                    price,
                    cost,
                };
                portfolio.apply(&trade);
                diag.sells += 1;
                trades.push(trade);
            }
        }

        self.last_diagnostics = diag;
        trades
    }

    /// Buys up to `shares`, shrinking to what cash can cover after fees.
    fn buy(
        &self,
        date: NaiveDate,
        symbol: &str,
        shares: f64,
        price: f64,
        portfolio: &mut Portfolio,
    ) -> Option<Trade> {
        let fee_rate = self.config.fee_rate_buy;
        let total_cost = |qty: u64| {
            let gross = qty as f64 * price;
            gross + gross * fee_rate
        };

        let mut quantity = self.config.whole_lots(shares);
        if quantity == 0 {
            return None;
        }
        if total_cost(quantity) > portfolio.cash {
            quantity = self
                .config
                .whole_lots(portfolio.cash / (price * (1.0 + fee_rate)));
            // Rounding can leave the floored quantity a hair over budget.
            while quantity > 0 && total_cost(quantity) > portfolio.cash {
                quantity -= self.config.lot_size.min(quantity);
            }
            if quantity == 0 {
                return None;
            }
        }

        let trade = Trade {
            date,
            side: Side::Buy,
            symbol: symbol.to_string(),
            quantity,
            price,
            cost: quantity as f64 * price * fee_rate,
        };
        portfolio.apply(&trade);
        Some(trade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn no_fees() -> RebalanceConfig {
        RebalanceConfig {
            fee_rate_buy: 0.0,
            fee_rate_sell: 0.0,
            min_trade_ratio: 0.005,
            lot_size: 1,
            execution_price: ExecutionPrice::Open,
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn execution_price_parses() {
        assert_eq!("open".parse::<ExecutionPrice>(), Ok(ExecutionPrice::Open));
        assert_eq!("next_open".parse::<ExecutionPrice>(), Ok(ExecutionPrice::Open));
        assert_eq!(" Close ".parse::<ExecutionPrice>(), Ok(ExecutionPrice::Close));
        assert!("vwap".parse::<ExecutionPrice>().is_err());
    }

    #[test]
    fn config_validation() {
        assert!(RebalanceConfig::default().validate().is_ok());
        let bad_lot = RebalanceConfig {
            lot_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            bad_lot.validate(),
            Err(NavtraderError::ConfigInvalid { ref key, .. }) if key == "lot_size"
        ));
        let bad_fee = RebalanceConfig {
            fee_rate_sell: 1.0,
            ..Default::default()
        };
        assert!(bad_fee.validate().is_err());
        let negative = RebalanceConfig {
            fee_rate_buy: -0.001,
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn whole_lots_rounds_down() {
        let config = RebalanceConfig {
            lot_size: 100,
            ..Default::default()
        };
        assert_eq!(config.whole_lots(1_299.9), 1_200);
        assert_eq!(config.whole_lots(99.0), 0);
        assert_eq!(config.whole_lots(-5.0), 0);
        assert_eq!(config.whole_lots(f64::INFINITY), 0);
    }

    #[test]
    fn equal_weight_from_cash_without_fees() {
        let mut portfolio = Portfolio::new(1_000_000.0);
        let prices = PriceQuote::new().with("A", 100.0).with("B", 50.0);
        let mut rebalancer = Rebalancer::new(no_fees());

        let trades = rebalancer.rebalance(date(), &symbols(&["A", "B"]), &prices, &mut portfolio);

        assert_eq!(trades.len(), 2);
        assert_eq!((trades[0].side, trades[0].symbol.as_str()), (Side::Buy, "A"));
        assert_eq!(trades[0].quantity, 5_000);
        assert_eq!((trades[1].side, trades[1].symbol.as_str()), (Side::Buy, "B"));
        assert_eq!(trades[1].quantity, 10_000);
        assert_relative_eq!(portfolio.cash, 0.0);
        assert_eq!(rebalancer.last_diagnostics().buys, 2);
    }

    #[test]
    fn buy_fee_shrinks_last_fill_to_available_cash() {
        let mut portfolio = Portfolio::new(1_000_000.0);
        let prices = PriceQuote::new().with("A", 100.0).with("B", 50.0);
        let config = RebalanceConfig {
            fee_rate_buy: 0.002,
            ..no_fees()
        };
        let mut rebalancer = Rebalancer::new(config);

        let trades = rebalancer.rebalance(date(), &symbols(&["A", "B"]), &prices, &mut portfolio);

        let bought: u64 = trades.iter().map(|t| t.quantity).sum();
        assert!(bought < 15_000);
        assert_eq!(trades[0].quantity, 5_000);
        assert_eq!(trades[1].quantity, 9_960);
        assert_relative_eq!(trades[0].cost, 1_000.0);
        assert!(portfolio.cash >= 0.0);
        assert!(portfolio.cash < 50.0);
    }

    #[test]
    fn missing_price_target_is_locked() {
        let mut portfolio = Portfolio::new(1_000_000.0);
        let prices = PriceQuote::new()
            .with("A", 100.0)
            .with("B", 50.0)
            .with_missing("C");
        let mut rebalancer = Rebalancer::new(no_fees());

        let trades =
            rebalancer.rebalance(date(), &symbols(&["A", "B", "C"]), &prices, &mut portfolio);

        assert!(trades.iter().all(|t| t.symbol != "C"));
        let diag = rebalancer.last_diagnostics();
        assert_eq!(diag.target_count, 3);
        assert_eq!(diag.tradable_targets, 2);
        assert_eq!(diag.locked_targets, 1);
        assert_eq!(diag.locked_target_symbols, vec!["C"]);
        // N counts tradable targets only, so A and B each get half.
        assert_eq!(trades[0].quantity, 5_000);
        assert_eq!(trades[1].quantity, 10_000);
    }

    #[test]
    fn locked_holding_value_is_excluded_from_allocation() {
        let mut portfolio = Portfolio::new(900_000.0);
        portfolio.set_quantity("C", 1_000);
        let prices = PriceQuote::new()
            .with("A", 100.0)
            .with("B", 50.0)
            .with("C", 0.0);
        let basis = PriceQuote::new().with("A", 100.0).with("B", 50.0).with("C", 100.0);
        let mut rebalancer = Rebalancer::new(no_fees());

        let trades = rebalancer.rebalance_with_basis(
            date(),
            &symbols(&["A", "B", "C"]),
            &prices,
            Some(&basis),
            &mut portfolio,
        );

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].quantity, 4_500);
        assert_eq!(trades[1].quantity, 9_000);
        assert_eq!(portfolio.quantity("C"), 1_000);
        assert_relative_eq!(portfolio.cash, 0.0);
    }

    #[test]
    fn non_target_without_price_is_kept() {
        let mut portfolio = Portfolio::new(0.0);
        portfolio.set_quantity("OLD", 300);
        portfolio.set_quantity("GONE", 100);
        let prices = PriceQuote::new()
            .with("A", 10.0)
            .with("GONE", 20.0)
            .with_missing("OLD");
        let mut rebalancer = Rebalancer::new(no_fees());

        let trades = rebalancer.rebalance(date(), &symbols(&["A"]), &prices, &mut portfolio);

        assert_eq!(portfolio.quantity("OLD"), 300);
        assert!(!portfolio.has_position("GONE"));
        assert_eq!(trades[0].side, Side::Sell);
        assert_eq!(trades[0].symbol, "GONE");
        assert_eq!(trades[1].side, Side::Buy);
        assert_eq!(trades[1].symbol, "A");
        assert_eq!(trades[1].quantity, 200);
        let diag = rebalancer.last_diagnostics();
        assert_eq!(diag.locked_sells, 1);
        assert_eq!(diag.locked_sell_symbols, vec!["OLD"]);
        assert_eq!(diag.sells, 1);
    }

    #[test]
    fn liquidation_charges_sell_fee() {
        let mut portfolio = Portfolio::new(0.0);
        portfolio.set_quantity("X", 1_000);
        let prices = PriceQuote::new().with("X", 10.0);
        let config = RebalanceConfig {
            fee_rate_sell: 0.004,
            ..no_fees()
        };
        let mut rebalancer = Rebalancer::new(config);

        let trades = rebalancer.rebalance(date(), &[], &prices, &mut portfolio);

        assert_eq!(trades.len(), 1);
        assert_relative_eq!(trades[0].cost, 40.0);
        assert_relative_eq!(portfolio.cash, 9_960.0);
        assert!(portfolio.positions.is_empty());
    }

    #[test]
    fn non_target_sells_follow_symbol_order() {
        let mut portfolio = Portfolio::new(0.0);
        for symbol in ["Z", "M", "B"] {
            portfolio.set_quantity(symbol, 10);
        }
        let prices = PriceQuote::new().with("Z", 1.0).with("M", 1.0).with("B", 1.0);
        let mut rebalancer = Rebalancer::new(no_fees());

        let trades = rebalancer.rebalance(date(), &[], &prices, &mut portfolio);

        let order: Vec<&str> = trades.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(order, vec!["B", "M", "Z"]);
    }

    #[test]
    fn overweight_target_is_trimmed() {
        let mut portfolio = Portfolio::new(0.0);
        portfolio.set_quantity("A", 1_000);
        let prices = PriceQuote::new().with("A", 100.0).with("B", 100.0);
        let mut rebalancer = Rebalancer::new(no_fees());

        let trades = rebalancer.rebalance(date(), &symbols(&["A", "B"]), &prices, &mut portfolio);

        assert_eq!(trades.len(), 2);
        assert_eq!((trades[0].side, trades[0].quantity), (Side::Sell, 500));
        assert_eq!((trades[1].side, trades[1].quantity), (Side::Buy, 500));
        assert_eq!(portfolio.quantity("A"), 500);
        assert_eq!(portfolio.quantity("B"), 500);
    }

    #[test]
    fn small_drift_is_not_traded() {
        let mut portfolio = Portfolio::new(0.0);
        portfolio.set_quantity("A", 1_010);
        portfolio.set_quantity("B", 990);
        let prices = PriceQuote::new().with("A", 100.0).with("B", 100.0);
        let config = RebalanceConfig {
            min_trade_ratio: 0.02,
            ..no_fees()
        };
        let mut rebalancer = Rebalancer::new(config);

        let trades = rebalancer.rebalance(date(), &symbols(&["A", "B"]), &prices, &mut portfolio);

        assert!(trades.is_empty());
    }

    #[test]
    fn lot_size_rounds_quantities() {
        let mut portfolio = Portfolio::new(100_000.0);
        let prices = PriceQuote::new().with("A", 3.3).with("B", 7.0);
        let config = RebalanceConfig {
            lot_size: 500,
            ..no_fees()
        };
        let mut rebalancer = Rebalancer::new(config);

        let trades = rebalancer.rebalance(date(), &symbols(&["A", "B"]), &prices, &mut portfolio);

        assert!(trades.iter().all(|t| t.quantity % 500 == 0));
        assert_eq!(trades[0].quantity, 15_000);
        assert_eq!(trades[1].quantity, 7_000);
    }

    #[test]
    fn second_call_is_idempotent() {
        let mut portfolio = Portfolio::new(1_000_000.0);
        let prices = PriceQuote::new().with("A", 100.0).with("B", 50.0);
        let targets = symbols(&["A", "B"]);
        let config = RebalanceConfig {
            fee_rate_buy: 0.002,
            fee_rate_sell: 0.002,
            ..no_fees()
        };
        let mut rebalancer = Rebalancer::new(config);

        let first = rebalancer.rebalance(date(), &targets, &prices, &mut portfolio);
        let second = rebalancer.rebalance(date(), &targets, &prices, &mut portfolio);

        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
        assert_eq!(rebalancer.last_diagnostics().buys, 0);
    }

    #[test]
    fn previous_close_basis_sizes_allocation() {
        let mut portfolio = Portfolio::new(0.0);
        portfolio.set_quantity("A", 1_000);
        let prices = PriceQuote::new().with("A", 100.0).with("B", 50.0);
        let basis = PriceQuote::new().with("A", 120.0).with("B", 50.0);
        let mut rebalancer = Rebalancer::new(no_fees());

        let trades = rebalancer.rebalance_with_basis(
            date(),
            &symbols(&["A", "B"]),
            &prices,
            Some(&basis),
            &mut portfolio,
        );

        // Value 120k at the previous close: 60k per symbol.
        assert_eq!((trades[0].side, trades[0].quantity), (Side::Sell, 400));
        assert_eq!((trades[1].side, trades[1].quantity), (Side::Buy, 800));
        assert_relative_eq!(portfolio.cash, 0.0);
    }

    #[test]
    fn empty_basis_falls_back_to_execution_prices() {
        let mut portfolio = Portfolio::new(10_000.0);
        let prices = PriceQuote::new().with("A", 10.0);
        let basis = PriceQuote::new().with_missing("A");
        let mut rebalancer = Rebalancer::new(no_fees());

        let trades = rebalancer.rebalance_with_basis(
            date(),
            &symbols(&["A"]),
            &prices,
            Some(&basis),
            &mut portfolio,
        );

        assert_eq!(trades[0].quantity, 1_000);
    }

    #[test]
    fn duplicate_targets_count_once() {
        let mut portfolio = Portfolio::new(10_000.0);
        let prices = PriceQuote::new().with("A", 10.0).with("B", 10.0);
        let mut rebalancer = Rebalancer::new(no_fees());

        let trades =
            rebalancer.rebalance(date(), &symbols(&["A", "B", "A"]), &prices, &mut portfolio);

        assert_eq!(rebalancer.last_diagnostics().target_count, 2);
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].quantity, 500);
    }

    #[test]
    fn diagnostics_are_replaced_each_call() {
        let mut portfolio = Portfolio::new(1_000.0);
        let mut rebalancer = Rebalancer::new(no_fees());
        let locked = PriceQuote::new().with_missing("A");
        rebalancer.rebalance(date(), &symbols(&["A"]), &locked, &mut portfolio);
        assert_eq!(rebalancer.last_diagnostics().locked_targets, 1);

        let open = PriceQuote::new().with("A", 1.0);
        rebalancer.rebalance(date(), &symbols(&["A"]), &open, &mut portfolio);
        assert_eq!(rebalancer.last_diagnostics().locked_targets, 0);
        assert!(rebalancer.last_diagnostics().locked_target_symbols.is_empty());
    }

    fn price_strategy() -> impl Strategy<Value = Option<f64>> {
        prop_oneof![
            1 => Just(None),
            1 => Just(Some(0.0)),
            6 => (0.5f64..500.0).prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn cash_never_negative_and_locked_never_traded(
            cash in 0.0f64..5_000_000.0,
            held in proptest::collection::vec(0u64..20_000, 6),
            quotes in proptest::collection::vec(price_strategy(), 6),
            basis_quotes in proptest::collection::vec(price_strategy(), 6),
            target_mask in proptest::collection::vec(any::<bool>(), 6),
            fee_rate_buy in 0.0f64..0.01,
            fee_rate_sell in 0.0f64..0.01,
            min_trade_ratio in 0.0f64..0.05,
            lot_size in prop_oneof![Just(1u64), Just(100u64), Just(500u64)],
        ) {
            let names: Vec<String> = (0..6).map(|i| format!("S{i}")).collect();
            let mut portfolio = Portfolio::new(cash);
            let mut prices = PriceQuote::new();
            let mut basis = PriceQuote::new();
            for (i, name) in names.iter().enumerate() {
                portfolio.set_quantity(name, held[i]);
                prices.insert(name.clone(), quotes[i]);
                basis.insert(name.clone(), basis_quotes[i]);
            }
            let targets: Vec<String> = names
                .iter()
                .zip(&target_mask)
                .filter(|(_, keep)| **keep)
                .map(|(n, _)| n.clone())
                .collect();
            let config = RebalanceConfig {
                fee_rate_buy,
                fee_rate_sell,
                min_trade_ratio,
                lot_size,
                execution_price: ExecutionPrice::Open,
            };
            let mut rebalancer = Rebalancer::new(config);

            let trades = rebalancer.rebalance_with_basis(
                date(), &targets, &prices, Some(&basis), &mut portfolio,
            );

            prop_assert!(portfolio.cash >= 0.0);
            for trade in &trades {
                prop_assert!(prices.get(&trade.symbol).is_some());
                prop_assert!(trade.quantity > 0);
            }
            for symbol in &rebalancer.last_diagnostics().locked_target_symbols {
                prop_assert!(trades.iter().all(|t| &t.symbol != symbol));
            }
            prop_assert!(portfolio.positions.values().all(|q| *q > 0));
        }
    }
}
