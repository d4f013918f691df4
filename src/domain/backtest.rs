//! Backtest driver: walks the rebalance plan and marks the portfolio daily.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::benchmark::BenchmarkNavPoint;
use super::calendar::TradingCalendar;
use super::error::NavtraderError;
use super::execution::{ExecutionPrice, RebalanceConfig, RebalanceDiagnostics, Rebalancer};
use super::metrics::{BasicMetrics, BenchmarkMetrics};
use super::plan::RebalancePlan;
use super::portfolio::{NavPoint, Portfolio, PriceQuote};
use super::trade::Trade;
use crate::ports::data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub rebalance: RebalanceConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 10_000_000.0,
            rebalance: RebalanceConfig::default(),
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), NavtraderError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(NavtraderError::invalid(
                "backtest",
                "initial_capital",
                format!("must be positive, got {}", self.initial_capital),
            ));
        }
        self.rebalance.validate()
    }
}

/// Diagnostics for one executed rebalance cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleDiagnostics {
    pub scheduled: NaiveDate,
    pub executed: NaiveDate,
    #[serde(flatten)]
    pub counters: RebalanceDiagnostics,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub nav: Vec<NavPoint>,
    pub trades: Vec<Trade>,
    pub cycles: Vec<CycleDiagnostics>,
    /// Scheduled dates with no trading day to execute on.
    pub skipped: Vec<NaiveDate>,
    pub portfolio: Portfolio,
}

impl BacktestResult {
    pub fn final_nav(&self) -> Option<f64> {
        self.nav.last().map(|p| p.value)
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.nav.first().map(|p| p.date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.nav.last().map(|p| p.date)
    }
}

/// Everything a report writer needs from one run.
pub struct BacktestReport<'a> {
    pub result: &'a BacktestResult,
    pub basic: Option<&'a BasicMetrics>,
    pub benchmark: Option<&'a [BenchmarkNavPoint]>,
    pub comparison: Option<&'a BenchmarkMetrics>,
}

/// Runs the plan against `provider`.
///
/// Each scheduled date executes on the next trading day after it, sized on
/// the previous session's closes. The portfolio is then marked at the close
/// of every trading day until the day before the next cycle executes.
pub fn run_backtest(
    provider: &dyn MarketDataPort,
    plan: &RebalancePlan,
    config: &BacktestConfig,
) -> Result<BacktestResult, NavtraderError> {
    config.validate()?;

    let calendar = TradingCalendar::new(provider);
    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut rebalancer = Rebalancer::new(config.rebalance.clone());
    let execution_price = config.rebalance.execution_price;

    let events: Vec<(NaiveDate, &[String])> = plan.iter().collect();
    let mut nav = Vec::new();
    let mut trades = Vec::new();
    let mut cycles = Vec::new();
    let mut skipped = Vec::new();

    for (i, &(scheduled, targets)) in events.iter().enumerate() {
        let Some(exec) = calendar.next_trading_day(scheduled) else {
            warn!(%scheduled, "no trading day after scheduled date, skipping cycle");
            skipped.push(scheduled);
            continue;
        };

        let mut universe = targets.to_vec();
        for symbol in portfolio.symbols() {
            if !universe.contains(&symbol) {
                universe.push(symbol);
            }
        }

        let prices = fetch_quote(provider, exec, &universe, execution_price);
        let basis = calendar
            .previous_trading_day(exec)
            .map(|prev| fetch_quote(provider, prev, &universe, ExecutionPrice::Close));

        let fills =
            rebalancer.rebalance_with_basis(exec, targets, &prices, basis.as_ref(), &mut portfolio);
        let counters = rebalancer.last_diagnostics().clone();
        info!(
            %scheduled,
            %exec,
            targets = counters.target_count,
            locked = counters.locked_targets,
            buys = counters.buys,
            sells = counters.sells,
            cash = portfolio.cash,
            "rebalanced"
        );
        trades.extend(fills);
        cycles.push(CycleDiagnostics {
            scheduled,
            executed: exec,
            counters,
        });

        let end = match events.get(i + 1) {
            Some(&(next_scheduled, _)) => calendar
                .next_trading_day(next_scheduled)
                .and_then(|next_exec| calendar.previous_trading_day(next_exec))
                .unwrap_or(exec),
            None => exec,
        };

        let days = calendar.trading_days_between(exec, end);
        debug!(from = %exec, to = %end, days = days.len(), "holding period");
        for day in days {
            let held = portfolio.symbols();
            let closes = fetch_quote(provider, day, &held, ExecutionPrice::Close);
            nav.push(NavPoint {
                date: day,
                value: portfolio.total_value(&closes),
            });
        }
    }

    Ok(BacktestResult {
        nav,
        trades,
        cycles,
        skipped,
        portfolio,
    })
}

/// Provider failures degrade to an empty quote.
fn fetch_quote(
    provider: &dyn MarketDataPort,
    date: NaiveDate,
    symbols: &[String],
    field: ExecutionPrice,
) -> PriceQuote {
    if symbols.is_empty() {
        return PriceQuote::new();
    }
    let result = match field {
        ExecutionPrice::Open => provider.open_prices(date, symbols),
        ExecutionPrice::Close => provider.close_prices(date, symbols),
    };
    result.unwrap_or_else(|e| {
        warn!(%date, %field, error = %e, "price fetch failed, treating as missing");
        PriceQuote::new()
    })
}
