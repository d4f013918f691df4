//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::warn;

use crate::adapters::csv_adapter::{load_plan, CsvAdapter};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::retry_adapter::RetryingDataPort;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestReport, BacktestResult};
use crate::domain::benchmark::{to_nav_points, BenchmarkNavPoint, BenchmarkNormalizer};
use crate::domain::calendar::TradingCalendar;
use crate::domain::config_validation::{
    validate_config, DEFAULT_BENCHMARK_NAV, DEFAULT_INITIAL_CAPITAL, DEFAULT_OUTPUT_DIR,
    DEFAULT_RETRY, DEFAULT_RETRY_SLEEP_MS,
};
use crate::domain::error::NavtraderError;
use crate::domain::execution::{ExecutionPrice, RebalanceConfig};
use crate::domain::metrics::{BasicMetrics, BenchmarkMetrics};
use crate::domain::plan::RebalancePlan;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "navtrader", about = "Equal-weight rebalancing backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration and its rebalance plan
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the trading days in a date range
    Calendar {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
}

impl Cli {
    pub fn config_path(&self) -> &Path {
        match &self.command {
            Command::Backtest { config, .. }
            | Command::Validate { config }
            | Command::Calendar { config, .. } => config,
        }
    }
}

/// The `[log] level` of the command's config file, if it can be read.
pub fn log_level(cli: &Cli) -> Option<String> {
    FileConfigAdapter::from_file(cli.config_path())
        .ok()?
        .get_string("log", "level")
}

/// Directory for the run log: `-o` when given, else the configured output
/// directory. Only a real `backtest` run logs to a file.
pub fn log_dir(cli: &Cli) -> Option<PathBuf> {
    match &cli.command {
        Command::Backtest {
            output: Some(dir),
            dry_run: false,
            ..
        } => Some(dir.clone()),
        Command::Backtest {
            config,
            dry_run: false,
            ..
        } => FileConfigAdapter::from_file(config)
            .ok()
            .map(|adapter| output_dir(&adapter)),
        _ => None,
    }
}

/// Benchmark index settings from `[benchmark]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkSettings {
    pub code: String,
    pub initial_nav: f64,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, output.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Calendar { config, start, end } => run_calendar(&config, start, end),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Loads and validates the config, then loads the plan it names.
fn load_validated(config_path: &Path) -> Result<(FileConfigAdapter, RebalancePlan), ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;

    let plan = validate_config(&adapter)
        .and_then(|()| plan_path(&adapter))
        .and_then(|path| {
            eprintln!("Loading plan from {}", path.display());
            load_plan(&path)
        })
        .map_err(|e| {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        })?;
    Ok((adapter, plan))
}

fn run_backtest(config_path: &Path, output_override: Option<&Path>) -> ExitCode {
    // Stage 1: Load and validate config, load plan
    let (adapter, plan) = match load_validated(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    // Stage 2: Build engine config
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Build data port
    let data_port = match build_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if let Err(e) = data_port.inner().prefetch(&plan.all_symbols()) {
        warn!(error = %e, "prefetch failed, symbols load on demand");
    }

    let output_dir = output_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| output_dir(&adapter));

    // Stages 4-7: Simulate, measure, report
    run_backtest_pipeline(
        &data_port,
        &plan,
        &bt_config,
        benchmark_settings(&adapter).as_ref(),
        &CsvReportAdapter,
        &output_dir,
    )
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, NavtraderError> {
    let defaults = RebalanceConfig::default();

    let execution_price = match config.get_string("execution", "execution_price") {
        Some(raw) => raw
            .parse::<ExecutionPrice>()
            .map_err(|reason| NavtraderError::invalid("execution", "execution_price", reason))?,
        None => defaults.execution_price,
    };
    let lot_size = u64::try_from(config.get_int("execution", "lot_size", 1))
        .map_err(|_| NavtraderError::invalid("execution", "lot_size", "lot_size must be at least 1"))?;

    let bt_config = BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL),
        rebalance: RebalanceConfig {
            fee_rate_buy: config.get_double("execution", "fee_rate_buy", defaults.fee_rate_buy),
            fee_rate_sell: config.get_double("execution", "fee_rate_sell", defaults.fee_rate_sell),
            min_trade_ratio: config.get_double(
                "execution",
                "min_trade_ratio",
                defaults.min_trade_ratio,
            ),
            lot_size,
            execution_price,
        },
    };
    bt_config.validate()?;
    Ok(bt_config)
}

pub fn benchmark_settings(config: &dyn ConfigPort) -> Option<BenchmarkSettings> {
    let code = config.get_string("benchmark", "code")?.trim().to_string();
    if code.is_empty() {
        return None;
    }
    Some(BenchmarkSettings {
        code,
        initial_nav: config.get_double("benchmark", "initial_nav", DEFAULT_BENCHMARK_NAV),
    })
}

pub fn plan_path(adapter: &FileConfigAdapter) -> Result<PathBuf, NavtraderError> {
    adapter
        .get_string("backtest", "plan")
        .filter(|p| !p.trim().is_empty())
        .map(|p| adapter.resolve_path(&p))
        .ok_or_else(|| NavtraderError::missing("backtest", "plan"))
}

pub fn output_dir(adapter: &FileConfigAdapter) -> PathBuf {
    let raw = adapter
        .get_string("backtest", "output_dir")
        .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());
    adapter.resolve_path(&raw)
}

pub fn build_data_port(
    adapter: &FileConfigAdapter,
) -> Result<RetryingDataPort<CsvAdapter>, NavtraderError> {
    let dir = adapter
        .get_string("data", "dir")
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| NavtraderError::missing("data", "dir"))?;
    let attempts = adapter.get_int("data", "retry", DEFAULT_RETRY).clamp(1, u32::MAX as i64) as u32;
    let sleep_ms = adapter
        .get_int("data", "retry_sleep_ms", DEFAULT_RETRY_SLEEP_MS)
        .max(0) as u64;

    Ok(RetryingDataPort::new(
        CsvAdapter::new(adapter.resolve_path(&dir)),
        attempts,
        Duration::from_millis(sleep_ms),
    ))
}

pub fn run_backtest_pipeline(
    data_port: &dyn MarketDataPort,
    plan: &RebalancePlan,
    bt_config: &BacktestConfig,
    benchmark: Option<&BenchmarkSettings>,
    reporter: &dyn ReportPort,
    output_dir: &Path,
) -> ExitCode {
    // Stage 4: Run backtest
    eprintln!(
        "Running backtest: {} rebalance dates, {} symbols",
        plan.len(),
        plan.all_symbols().len()
    );
    let result = match backtest_engine::run_backtest(data_port, plan, bt_config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if result.nav.is_empty() {
        let err = NavtraderError::DataUnavailable {
            what: "no trading day could be simulated".into(),
        };
        eprintln!("error: {err}");
        return (&err).into();
    }

    // Stage 5: Compute metrics
    let basic = BasicMetrics::compute(&result.nav);
    let (bench_series, comparison) = match benchmark {
        Some(settings) => {
            let (series, comparison) = benchmark_comparison(data_port, &result, settings);
            (Some(series), comparison)
        }
        None => (None, None),
    };

    // Stage 6: Print console summary to stderr
    print_summary(&result, basic.as_ref(), benchmark, comparison.as_ref());

    // Stage 7: Write artifacts
    let report = BacktestReport {
        result: &result,
        basic: basic.as_ref(),
        benchmark: bench_series.as_deref(),
        comparison: comparison.as_ref(),
    };
    match reporter.write(&report, output_dir) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", output_dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to write report: {e}");
            (&e).into()
        }
    }
}

fn benchmark_comparison(
    data_port: &dyn MarketDataPort,
    result: &BacktestResult,
    settings: &BenchmarkSettings,
) -> (Vec<BenchmarkNavPoint>, Option<BenchmarkMetrics>) {
    let (Some(start), Some(end)) = (result.start_date(), result.end_date()) else {
        return (Vec::new(), None);
    };
    let mut normalizer = BenchmarkNormalizer::new(settings.initial_nav);
    let series = normalizer
        .series(data_port, &settings.code, start, end)
        .to_vec();
    let comparison = BenchmarkMetrics::compute(&result.nav, &to_nav_points(&series));
    (series, comparison)
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn num(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn print_summary(
    result: &BacktestResult,
    basic: Option<&BasicMetrics>,
    benchmark: Option<&BenchmarkSettings>,
    comparison: Option<&BenchmarkMetrics>,
) {
    eprintln!("\n=== Backtest Results ===");
    if let (Some(start), Some(end)) = (result.start_date(), result.end_date()) {
        eprintln!("Period:           {} to {} ({} days)", start, end, result.nav.len());
    }
    eprintln!("Final NAV:        {}", num(result.final_nav()));
    eprintln!("Total Return:     {}", pct(basic.map(|m| m.cum_return)));
    eprintln!("Annualized:       {}", pct(basic.map(|m| m.ann_return)));
    eprintln!("Volatility:       {}", pct(basic.and_then(|m| m.ann_vol)));
    eprintln!("Sharpe Ratio:     {}", num(basic.and_then(|m| m.sharpe)));
    eprintln!("Max Drawdown:     -{}", pct(basic.map(|m| m.max_drawdown)));
    eprintln!("Total Trades:     {}", result.trades.len());
    eprintln!("Rebalances:       {}", result.cycles.len());
    if !result.skipped.is_empty() {
        eprintln!("Skipped:          {}", result.skipped.len());
    }

    let locked: usize = result.cycles.iter().map(|c| c.counters.locked_targets).sum();
    if locked > 0 {
        eprintln!("Locked Targets:   {locked}");
    }

    if let Some(settings) = benchmark {
        eprintln!("\n=== Benchmark ({}) ===", settings.code);
        eprintln!("Benchmark Return: {}", pct(comparison.map(|m| m.bench_cum)));
        eprintln!("Excess Return:    {}", pct(comparison.map(|m| m.excess_cum)));
        eprintln!("Info Ratio:       {}", num(comparison.and_then(|m| m.information_ratio)));
        eprintln!("Beta:             {}", num(comparison.and_then(|m| m.beta)));
        eprintln!("Alpha:            {}", pct(comparison.and_then(|m| m.alpha)));
    }
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    let (adapter, plan) = match load_validated(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Config validated successfully");

    let rc = &bt_config.rebalance;
    eprintln!("\nExecution:");
    eprintln!("  initial_capital: {:.2}", bt_config.initial_capital);
    eprintln!("  fee_rate_buy:    {}", rc.fee_rate_buy);
    eprintln!("  fee_rate_sell:   {}", rc.fee_rate_sell);
    eprintln!("  min_trade_ratio: {}", rc.min_trade_ratio);
    eprintln!("  lot_size:        {}", rc.lot_size);
    eprintln!("  execution_price: {}", rc.execution_price);

    eprintln!("\nPlan:");
    if let (Some(first), Some(last)) = (plan.first_date(), plan.last_date()) {
        eprintln!("  {} rebalance dates, {} to {}", plan.len(), first, last);
    }
    eprintln!("  symbols: {}", plan.all_symbols().join(", "));

    if let Some(settings) = benchmark_settings(&adapter) {
        eprintln!("\nBenchmark: {} (initial nav {})", settings.code, settings.initial_nav);
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let (adapter, plan) = match load_validated(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    if let Err(e) = build_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    eprintln!(
        "Plan: {} rebalance dates, {} symbols",
        plan.len(),
        plan.all_symbols().len()
    );
    eprintln!("Configuration is valid.");
    ExitCode::SUCCESS
}

fn run_calendar(config_path: &Path, start: NaiveDate, end: NaiveDate) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data_port = match build_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let days = TradingCalendar::new(&data_port).trading_days_between(start, end);
    for day in &days {
        println!("{day}");
    }
    eprintln!("{} trading days", days.len());
    ExitCode::SUCCESS
}
