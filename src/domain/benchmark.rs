//! Benchmark index normalization into a NAV series.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

use super::calendar::TradingCalendar;
use super::portfolio::NavPoint;
use crate::ports::data_port::{IndexClose, MarketDataPort};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchmarkNavPoint {
    pub date: NaiveDate,
    /// Raw close; absent for the constant fallback series.
    pub close: Option<f64>,
    pub nav: f64,
}

/// Scales closes so the first row equals `initial_nav`. A zero first close
/// is treated as a base of 1.
pub fn normalize(closes: &[IndexClose], initial_nav: f64) -> Vec<BenchmarkNavPoint> {
    let mut sorted = closes.to_vec();
    sorted.sort_by_key(|c| c.date);

    let Some(first) = sorted.first() else {
        return Vec::new();
    };
    let base = if first.close == 0.0 { 1.0 } else { first.close };

    sorted
        .iter()
        .map(|c| BenchmarkNavPoint {
            date: c.date,
            close: Some(c.close),
            nav: initial_nav * c.close / base,
        })
        .collect()
}

/// A flat series at `initial_nav` over the given days.
pub fn constant(days: &[NaiveDate], initial_nav: f64) -> Vec<BenchmarkNavPoint> {
    days.iter()
        .map(|&date| BenchmarkNavPoint {
            date,
            close: None,
            nav: initial_nav,
        })
        .collect()
}

pub fn to_nav_points(series: &[BenchmarkNavPoint]) -> Vec<NavPoint> {
    series
        .iter()
        .map(|p| NavPoint {
            date: p.date,
            value: p.nav,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    code: String,
    start: NaiveDate,
    end: NaiveDate,
}

/// Builds benchmark NAV series and memoizes them per (code, start, end).
///
/// The cache grows with every distinct range requested; call
/// [`BenchmarkNormalizer::clear_cache`] when reusing one normalizer across
/// many runs.
pub struct BenchmarkNormalizer {
    initial_nav: f64,
    cache: HashMap<SeriesKey, Vec<BenchmarkNavPoint>>,
}

impl BenchmarkNormalizer {
    pub fn new(initial_nav: f64) -> Self {
        Self {
            initial_nav,
            cache: HashMap::new(),
        }
    }

    /// Benchmark NAV for `code` over `[start, end]`.
    ///
    /// Falls back to a constant series over the trading days in range when
    /// the provider has no closes or fails.
    pub fn series(
        &mut self,
        provider: &dyn MarketDataPort,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> &[BenchmarkNavPoint] {
        let key = SeriesKey {
            code: code.to_string(),
            start,
            end,
        };
        let initial_nav = self.initial_nav;
        self.cache
            .entry(key)
            .or_insert_with(|| build_series(provider, code, start, end, initial_nav))
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

fn build_series(
    provider: &dyn MarketDataPort,
    code: &str,
    start: NaiveDate,
    end: NaiveDate,
    initial_nav: f64,
) -> Vec<BenchmarkNavPoint> {
    let closes = match provider.index_close_series(code, start, end) {
        Ok(series) => series.unwrap_or_default(),
        Err(e) => {
            warn!(code, error = %e, "benchmark fetch failed");
            Vec::new()
        }
    };

    if closes.is_empty() {
        warn!(code, %start, %end, "no benchmark closes, using constant series");
        let days = TradingCalendar::new(provider).trading_days_between(start, end);
        return constant(&days, initial_nav);
    }

    let series = normalize(&closes, initial_nav);
    info!(code, rows = series.len(), "benchmark normalized");
    series
}
