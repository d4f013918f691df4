//! Configuration validation.
//!
//! Checks every recognized key before any market data is read and reports
//! the first violation.

use crate::domain::error::NavtraderError;
use crate::domain::execution::ExecutionPrice;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000_000.0;
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_RETRY: i64 = 3;
pub const DEFAULT_RETRY_SLEEP_MS: i64 = 1000;
pub const DEFAULT_BENCHMARK_NAV: f64 = 1.0;
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

const NUMERIC_KEYS: [(&str, &str); 8] = [
    ("backtest", "initial_capital"),
    ("execution", "fee_rate_buy"),
    ("execution", "fee_rate_sell"),
    ("execution", "min_trade_ratio"),
    ("execution", "lot_size"),
    ("data", "retry"),
    ("data", "retry_sleep_ms"),
    ("benchmark", "initial_nav"),
];

const INTEGER_KEYS: [(&str, &str); 3] = [
    ("execution", "lot_size"),
    ("data", "retry"),
    ("data", "retry_sleep_ms"),
];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), NavtraderError> {
    validate_numbers(config)?;
    validate_backtest(config)?;
    validate_execution(config)?;
    validate_data(config)?;
    validate_benchmark(config)?;
    validate_log(config)?;
    Ok(())
}

fn validate_numbers(config: &dyn ConfigPort) -> Result<(), NavtraderError> {
    for (section, key) in NUMERIC_KEYS {
        if config.is_malformed_number(section, key) {
            return Err(NavtraderError::invalid(section, key, "not a number"));
        }
    }
    for (section, key) in INTEGER_KEYS {
        let malformed = config
            .get_string(section, key)
            .is_some_and(|v| v.trim().parse::<i64>().is_err());
        if malformed {
            return Err(NavtraderError::invalid(section, key, "must be a whole number"));
        }
    }
    Ok(())
}

fn validate_backtest(config: &dyn ConfigPort) -> Result<(), NavtraderError> {
    let capital = config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL);
    if !capital.is_finite() || capital <= 0.0 {
        return Err(NavtraderError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    require_non_empty(config, "backtest", "plan")?;
    if config
        .get_string("backtest", "output_dir")
        .is_some_and(|v| v.trim().is_empty())
    {
        return Err(NavtraderError::invalid(
            "backtest",
            "output_dir",
            "output_dir must not be empty",
        ));
    }
    Ok(())
}

fn validate_execution(config: &dyn ConfigPort) -> Result<(), NavtraderError> {
    for key in ["fee_rate_buy", "fee_rate_sell"] {
        let value = config.get_double("execution", key, 0.004);
        check_fraction(key, value)?;
    }
    check_fraction(
        "min_trade_ratio",
        config.get_double("execution", "min_trade_ratio", 0.005),
    )?;

    if config.get_int("execution", "lot_size", 1) < 1 {
        return Err(NavtraderError::invalid(
            "execution",
            "lot_size",
            "lot_size must be at least 1",
        ));
    }

    if let Some(value) = config.get_string("execution", "execution_price") {
        value
            .parse::<ExecutionPrice>()
            .map_err(|reason| NavtraderError::invalid("execution", "execution_price", reason))?;
    }
    Ok(())
}

fn check_fraction(key: &str, value: f64) -> Result<(), NavtraderError> {
    if !(0.0..1.0).contains(&value) {
        return Err(NavtraderError::invalid(
            "execution",
            key,
            format!("{key} must be in [0, 1)"),
        ));
    }
    Ok(())
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), NavtraderError> {
    require_non_empty(config, "data", "dir")?;
    if config.get_int("data", "retry", DEFAULT_RETRY) < 1 {
        return Err(NavtraderError::invalid("data", "retry", "retry must be at least 1"));
    }
    if config.get_int("data", "retry_sleep_ms", DEFAULT_RETRY_SLEEP_MS) < 0 {
        return Err(NavtraderError::invalid(
            "data",
            "retry_sleep_ms",
            "retry_sleep_ms must be non-negative",
        ));
    }
    Ok(())
}

fn validate_benchmark(config: &dyn ConfigPort) -> Result<(), NavtraderError> {
    let nav = config.get_double("benchmark", "initial_nav", DEFAULT_BENCHMARK_NAV);
    if !nav.is_finite() || nav <= 0.0 {
        return Err(NavtraderError::invalid(
            "benchmark",
            "initial_nav",
            "initial_nav must be positive",
        ));
    }
    Ok(())
}

fn validate_log(config: &dyn ConfigPort) -> Result<(), NavtraderError> {
    match config.get_string("log", "level") {
        Some(level) if !LOG_LEVELS.contains(&level.trim().to_lowercase().as_str()) => {
            Err(NavtraderError::invalid(
                "log",
                "level",
                format!("unknown level '{level}'"),
            ))
        }
        _ => Ok(()),
    }
}

fn require_non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), NavtraderError> {
    match config.get_string(section, key) {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(NavtraderError::missing(section, key)),
    }
}
