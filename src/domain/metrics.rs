//! Performance metrics and statistics.
//!
//! Degenerate statistics (zero variance, too few points) come back as
//! `None` fields instead of failing the whole computation.

use super::portfolio::NavPoint;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicMetrics {
    pub cum_return: f64,
    pub ann_return: f64,
    pub ann_vol: Option<f64>,
    pub sharpe: Option<f64>,
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkMetrics {
    pub port_cum: f64,
    pub bench_cum: f64,
    pub excess_cum: f64,
    pub port_ann: f64,
    pub bench_ann: f64,
    pub excess_ann: f64,
    pub port_vol: Option<f64>,
    pub bench_vol: Option<f64>,
    pub excess_vol: Option<f64>,
    pub sharpe: Option<f64>,
    pub information_ratio: Option<f64>,
    pub beta: Option<f64>,
    pub alpha: Option<f64>,
    pub correlation: Option<f64>,
    pub max_drawdown: f64,
}

impl BasicMetrics {
    /// Statistics for a NAV series. `None` when the series is empty or
    /// starts at zero.
    pub fn compute(nav: &[NavPoint]) -> Option<Self> {
        let mut sorted = nav.to_vec();
        sorted.sort_by_key(|p| p.date);
        let values: Vec<f64> = sorted.iter().map(|p| p.value).collect();

        let first = *values.first()?;
        if first == 0.0 {
            return None;
        }

        let returns = daily_returns(&values);
        let cum_return = values[values.len() - 1] / first - 1.0;
        let ann_return = annualize(cum_return, values.len());
        let ann_vol = annualized_vol(&returns);

        Some(BasicMetrics {
            cum_return,
            ann_return,
            ann_vol,
            sharpe: ratio(ann_return, ann_vol),
            max_drawdown: max_drawdown(&values),
        })
    }
}

impl BenchmarkMetrics {
    /// Portfolio statistics relative to a benchmark NAV series, over the
    /// dates present in both. `None` when the join is empty or either leg
    /// starts at zero.
    pub fn compute(nav: &[NavPoint], benchmark: &[NavPoint]) -> Option<Self> {
        let bench_by_date: HashMap<NaiveDate, f64> =
            benchmark.iter().map(|p| (p.date, p.value)).collect();

        let mut joined: Vec<(NaiveDate, f64, f64)> = nav
            .iter()
            .filter_map(|p| bench_by_date.get(&p.date).map(|&b| (p.date, p.value, b)))
            .collect();
        joined.sort_by_key(|row| row.0);
        joined.dedup_by_key(|row| row.0);

        let port: Vec<f64> = joined.iter().map(|r| r.1).collect();
        let bench: Vec<f64> = joined.iter().map(|r| r.2).collect();

        let (port_first, bench_first) = (*port.first()?, *bench.first()?);
        if port_first == 0.0 || bench_first == 0.0 {
            return None;
        }

        let n = joined.len();
        let rp = daily_returns(&port);
        let rb = daily_returns(&bench);
        let rex: Vec<f64> = rp.iter().zip(&rb).map(|(p, b)| p - b).collect();

        let port_cum = port[n - 1] / port_first - 1.0;
        let bench_cum = bench[n - 1] / bench_first - 1.0;
        let excess_cum = (1.0 + port_cum) / (1.0 + bench_cum) - 1.0;

        let port_ann = annualize(port_cum, n);
        let bench_ann = annualize(bench_cum, n);
        let excess_ann = annualize(excess_cum, n);

        let port_vol = annualized_vol(&rp);
        let bench_vol = annualized_vol(&rb);
        let excess_vol = annualized_vol(&rex);

        let information_ratio = ratio(mean(&rex) * TRADING_DAYS_PER_YEAR, excess_vol);

        let var_b = covariance(&rb, &rb);
        let beta = (var_b > 0.0).then(|| covariance(&rp, &rb) / var_b);
        let alpha = beta.map(|b| port_ann - b * bench_ann);

        let var_p = covariance(&rp, &rp);
        let correlation =
            (var_p > 0.0 && var_b > 0.0).then(|| covariance(&rp, &rb) / (var_p * var_b).sqrt());

        Some(BenchmarkMetrics {
            port_cum,
            bench_cum,
            excess_cum,
            port_ann,
            bench_ann,
            excess_ann,
            port_vol,
            bench_vol,
            excess_vol,
            sharpe: ratio(port_ann, port_vol),
            information_ratio,
            beta,
            alpha,
            correlation,
            max_drawdown: max_drawdown(&port),
        })
    }
}

/// Simple returns with the first day defined as zero.
fn daily_returns(values: &[f64]) -> Vec<f64> {
    let mut returns = Vec::with_capacity(values.len());
    if values.is_empty() {
        return returns;
    }
    returns.push(0.0);
    returns.extend(values.windows(2).map(|w| {
        if w[0] != 0.0 {
            w[1] / w[0] - 1.0
        } else {
            0.0
        }
    }));
    returns
}

fn annualize(cum_return: f64, periods: usize) -> f64 {
    let factor = TRADING_DAYS_PER_YEAR / periods.max(1) as f64;
    (1.0 + cum_return).powf(factor) - 1.0
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (n - 1), scaled to a year.
fn annualized_vol(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let m = mean(returns);
    let var = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    Some(var.sqrt() * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Population covariance.
fn covariance(xs: &[f64], ys: &[f64]) -> f64 {
    let (mx, my) = (mean(xs), mean(ys));
    let n = xs.len().min(ys.len());
    if n == 0 {
        return 0.0;
    }
    xs.iter()
        .zip(ys)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>()
        / n as f64
}

fn ratio(numerator: f64, denominator: Option<f64>) -> Option<f64> {
    denominator.filter(|d| *d > 0.0).map(|d| numerator / d)
}

fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &v in values {
        peak = peak.max(v);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - v) / peak);
        }
    }
    max_dd
}
