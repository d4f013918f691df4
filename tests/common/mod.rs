#![allow(dead_code)]

use chrono::NaiveDate;
use navtrader::domain::calendar::is_weekday;
use navtrader::domain::error::NavtraderError;
use navtrader::domain::portfolio::PriceQuote;
use navtrader::ports::data_port::{IndexClose, MarketDataPort};
use std::cell::Cell;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy)]
pub struct Bar {
    pub open: Option<f64>,
    pub close: Option<f64>,
}

/// In-memory market data. An empty calendar means weekdays.
pub struct MockDataPort {
    pub calendar: Vec<NaiveDate>,
    pub bars: HashMap<(String, NaiveDate), Bar>,
    pub index: HashMap<String, Vec<IndexClose>>,
    pub failing_dates: HashSet<NaiveDate>,
    pub price_calls: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            calendar: Vec::new(),
            bars: HashMap::new(),
            index: HashMap::new(),
            failing_dates: HashSet::new(),
            price_calls: Cell::new(0),
        }
    }

    pub fn with_calendar(mut self, days: Vec<NaiveDate>) -> Self {
        self.calendar = days;
        self
    }

    pub fn with_bar(mut self, symbol: &str, date: NaiveDate, open: f64, close: f64) -> Self {
        self.bars.insert(
            (symbol.to_string(), date),
            Bar {
                open: Some(open),
                close: Some(close),
            },
        );
        self
    }

    /// Same open and close on every day in `days`.
    pub fn with_flat_prices(mut self, symbol: &str, days: &[NaiveDate], price: f64) -> Self {
        for &day in days {
            self = self.with_bar(symbol, day, price, price);
        }
        self
    }

    pub fn with_index(mut self, code: &str, closes: Vec<(NaiveDate, f64)>) -> Self {
        self.index.insert(
            code.to_string(),
            closes
                .into_iter()
                .map(|(date, close)| IndexClose { date, close })
                .collect(),
        );
        self
    }

    /// Price requests for `date` fail.
    pub fn with_price_error(mut self, date: NaiveDate) -> Self {
        self.failing_dates.insert(date);
        self
    }

    fn quote(
        &self,
        date: NaiveDate,
        symbols: &[String],
        field: impl Fn(&Bar) -> Option<f64>,
    ) -> Result<PriceQuote, NavtraderError> {
        self.price_calls.set(self.price_calls.get() + 1);
        if self.failing_dates.contains(&date) {
            return Err(NavtraderError::DataUnavailable {
                what: format!("prices for {date}"),
            });
        }
        Ok(symbols
            .iter()
            .map(|s| {
                let price = self.bars.get(&(s.clone(), date)).and_then(&field);
                (s.clone(), price)
            })
            .collect())
    }
}

impl MarketDataPort for MockDataPort {
    fn trading_days(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, NavtraderError> {
        Ok(self
            .calendar
            .iter()
            .copied()
            .filter(|d| *d >= start && *d <= end)
            .collect())
    }

    fn open_prices(
        &self,
        date: NaiveDate,
        symbols: &[String],
    ) -> Result<PriceQuote, NavtraderError> {
        self.quote(date, symbols, |b| b.open)
    }

    fn close_prices(
        &self,
        date: NaiveDate,
        symbols: &[String],
    ) -> Result<PriceQuote, NavtraderError> {
        self.quote(date, symbols, |b| b.close)
    }

    fn index_close_series(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<IndexClose>>, NavtraderError> {
        Ok(self.index.get(code).map(|closes| {
            closes
                .iter()
                .copied()
                .filter(|c| c.date >= start && c.date <= end)
                .collect()
        }))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_weekday(*d))
        .collect()
}

pub fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
