//! Trading calendar backed by the data port, with a weekday fallback.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use tracing::{debug, warn};

use crate::ports::data_port::MarketDataPort;

/// How far next/previous lookups search before giving up.
pub const SEARCH_LIMIT_DAYS: u64 = 366;

/// Resolves trading days from an optional day source.
///
/// The source's days are loaded once. Inside the span from its first to its
/// last listed day the source is authoritative; outside that span, and when
/// the source is absent, fails or lists nothing, Monday to Friday trade.
/// The rule is per day and next/previous lookups go through
/// [`TradingCalendar::trading_days_between`], so all queries agree.
#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    days: Vec<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(source: &dyn MarketDataPort) -> Self {
        let mut days = match source.trading_days(NaiveDate::MIN, NaiveDate::MAX) {
            Ok(days) => days,
            Err(e) => {
                warn!(error = %e, "trading day source failed, using weekdays");
                Vec::new()
            }
        };
        days.sort();
        days.dedup();
        debug!(
            days = days.len(),
            first = ?days.first(),
            last = ?days.last(),
            "trading calendar loaded"
        );
        Self { days }
    }

    /// A calendar with no day source: every weekday trades.
    pub fn weekdays() -> Self {
        Self::default()
    }

    pub fn trading_days_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        if start > end {
            return Vec::new();
        }
        let (Some(&first), Some(&last)) = (self.days.first(), self.days.last()) else {
            return weekdays_between(start, end);
        };

        let mut out = Vec::new();
        if start < first {
            if let Some(before) = first.pred_opt() {
                out.extend(weekdays_between(start, end.min(before)));
            }
        }

        let lo = start.max(first);
        let hi = end.min(last);
        if lo <= hi {
            let from = self.days.partition_point(|d| *d < lo);
            let to = self.days.partition_point(|d| *d <= hi);
            out.extend_from_slice(&self.days[from..to]);
        }

        if end > last {
            if let Some(after) = last.succ_opt() {
                out.extend(weekdays_between(start.max(after), end));
            }
        }
        out
    }

    pub fn next_trading_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        let start = date.succ_opt()?;
        let end = date.checked_add_days(Days::new(SEARCH_LIMIT_DAYS))?;
        self.trading_days_between(start, end).first().copied()
    }

    pub fn previous_trading_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        let end = date.pred_opt()?;
        let start = date.checked_sub_days(Days::new(SEARCH_LIMIT_DAYS))?;
        self.trading_days_between(start, end).last().copied()
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        date.pred_opt()
            .and_then(|prev| self.next_trading_day(prev))
            == Some(date)
    }
}

pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn weekdays_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_weekday(*d))
        .collect()
}
