//! CSV directory market data adapter and rebalance plan loader.
//!
//! Directory layout:
//!
//! ```text
//! <dir>/calendar.csv          date
//! <dir>/prices/<SYMBOL>.csv   date,open,close
//! <dir>/index/<CODE>.csv      date,close
//! ```

use chrono::NaiveDate;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::error::NavtraderError;
use crate::domain::plan::RebalancePlan;
use crate::domain::portfolio::PriceQuote;
use crate::ports::data_port::{IndexClose, MarketDataPort};

#[derive(Debug, Clone, Copy, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    open: Option<f64>,
    close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CalendarRow {
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct IndexRow {
    date: NaiveDate,
    close: Option<f64>,
}

/// Reads market data from a directory of CSV files.
///
/// Per-symbol price frames and the calendar load on first use and stay
/// cached until [`CsvAdapter::clear_cache`]. A price file that fails to
/// parse is cached as unreadable and that symbol quotes as missing.
pub struct CsvAdapter {
    base_path: PathBuf,
    frames: RefCell<HashMap<String, Option<Vec<PriceRow>>>>,
    calendar: RefCell<Option<Vec<NaiveDate>>>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            frames: RefCell::new(HashMap::new()),
            calendar: RefCell::new(None),
        }
    }

    fn price_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join("prices").join(format!("{symbol}.csv"))
    }

    fn index_path(&self, code: &str) -> PathBuf {
        self.base_path.join("index").join(format!("{code}.csv"))
    }

    /// Loads the given symbols' frames ahead of the run. Stops at the first
    /// unreadable file; the rest load lazily.
    pub fn prefetch(&self, symbols: &[String]) -> Result<(), NavtraderError> {
        for symbol in symbols {
            self.load_frame(symbol)?;
        }
        Ok(())
    }

    pub fn cached_symbols(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn clear_cache(&self) {
        self.frames.borrow_mut().clear();
        self.calendar.borrow_mut().take();
    }

    /// Reads `symbol`'s frame unless already cached. A parse failure is
    /// cached too, so the error is only reported once.
    fn load_frame(&self, symbol: &str) -> Result<(), NavtraderError> {
        if self.frames.borrow().contains_key(symbol) {
            return Ok(());
        }
        match read_sorted(&self.price_path(symbol), |r: &PriceRow| r.date) {
            Ok(rows) => {
                debug!(symbol, rows = rows.len(), "price frame loaded");
                self.frames.borrow_mut().insert(symbol.to_string(), Some(rows));
                Ok(())
            }
            Err(e) => {
                self.frames.borrow_mut().insert(symbol.to_string(), None);
                Err(e)
            }
        }
    }

    fn quote(&self, symbols: &[String], pick: impl Fn(&[PriceRow]) -> Option<f64>) -> PriceQuote {
        let mut quote = PriceQuote::new();
        for symbol in symbols {
            if let Err(e) = self.load_frame(symbol) {
                warn!(symbol = symbol.as_str(), error = %e, "price file unreadable, symbol has no prices");
            }
            let price = self
                .frames
                .borrow()
                .get(symbol.as_str())
                .and_then(|frame| frame.as_deref())
                .and_then(&pick);
            quote.insert(symbol.as_str(), price);
        }
        quote
    }
}

impl MarketDataPort for CsvAdapter {
    fn trading_days(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, NavtraderError> {
        if self.calendar.borrow().is_none() {
            let rows = read_sorted(&self.base_path.join("calendar.csv"), |r: &CalendarRow| {
                r.date
            })?;
            let mut days: Vec<NaiveDate> = rows.into_iter().map(|r| r.date).collect();
            days.dedup();
            *self.calendar.borrow_mut() = Some(days);
        }

        let calendar = self.calendar.borrow();
        Ok(calendar
            .iter()
            .flatten()
            .copied()
            .filter(|d| *d >= start && *d <= end)
            .collect())
    }

    fn open_prices(
        &self,
        date: NaiveDate,
        symbols: &[String],
    ) -> Result<PriceQuote, NavtraderError> {
        Ok(self.quote(symbols, |rows| {
            rows.binary_search_by_key(&date, |r| r.date)
                .ok()
                .and_then(|i| rows[i].open)
        }))
    }

    fn close_prices(
        &self,
        date: NaiveDate,
        symbols: &[String],
    ) -> Result<PriceQuote, NavtraderError> {
        Ok(self.quote(symbols, |rows| {
            let upto = rows.partition_point(|r| r.date <= date);
            rows[..upto].iter().rev().find_map(|r| r.close)
        }))
    }

    fn index_close_series(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<IndexClose>>, NavtraderError> {
        let path = self.index_path(code);
        if !path.exists() {
            return Ok(None);
        }
        let rows = read_sorted(&path, |r: &IndexRow| r.date)?;
        Ok(Some(
            rows.into_iter()
                .filter(|r| r.date >= start && r.date <= end)
                .filter_map(|r| r.close.map(|close| IndexClose { date: r.date, close }))
                .collect(),
        ))
    }
}

/// Deserializes every row of `path` sorted by `key`. A missing file is empty.
fn read_sorted<T, K>(path: &Path, key: impl Fn(&T) -> K) -> Result<Vec<T>, NavtraderError>
where
    T: for<'de> Deserialize<'de>,
    K: Ord,
{
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut rows = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
    rows.sort_by_key(|r| key(r));
    Ok(rows)
}

/// Reads a `rebalance_date,symbol` plan file.
pub fn load_plan(path: &Path) -> Result<RebalancePlan, NavtraderError> {
    let file = path.display().to_string();
    let plan_error = |line: u64, reason: String| NavtraderError::PlanParse {
        file: file.clone(),
        line: line as usize,
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| plan_error(0, e.to_string()))?;

    let headers = reader.headers().map_err(|e| plan_error(1, e.to_string()))?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| plan_error(1, format!("missing '{name}' column")))
    };
    let date_col = column("rebalance_date")?;
    let symbol_col = column("symbol")?;

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            plan_error(line, e.to_string())
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let raw_date = record.get(date_col).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|_| plan_error(line, format!("invalid date '{raw_date}', expected YYYY-MM-DD")))?;

        let symbol = record.get(symbol_col).unwrap_or_default();
        if symbol.is_empty() {
            return Err(plan_error(line, "empty symbol".into()));
        }
        entries.push((date, symbol.to_string()));
    }

    RebalancePlan::from_entries(entries)
}
