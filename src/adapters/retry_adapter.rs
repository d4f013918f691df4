//! Retrying decorator around any [`MarketDataPort`].

use chrono::NaiveDate;
use std::time::Duration;
use tracing::warn;

use crate::domain::error::NavtraderError;
use crate::domain::portfolio::PriceQuote;
use crate::ports::data_port::{IndexClose, MarketDataPort};

/// Retries each transiently failed call up to `attempts` times in total,
/// sleeping a fixed delay between attempts. Other errors and the last
/// transient one are returned unchanged.
pub struct RetryingDataPort<P> {
    inner: P,
    attempts: u32,
    delay: Duration,
}

impl<P: MarketDataPort> RetryingDataPort<P> {
    pub fn new(inner: P, attempts: u32, delay: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn with_retry<T>(
        &self,
        call: &str,
        f: impl Fn(&P) -> Result<T, NavtraderError>,
    ) -> Result<T, NavtraderError> {
        let mut attempt = 1;
        loop {
            match f(&self.inner) {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => {
                    warn!(call, error = %e, "data call failed, not retrying");
                    return Err(e);
                }
                Err(e) if attempt < self.attempts => {
                    warn!(call, attempt, max = self.attempts, error = %e, "data call failed, retrying");
                    std::thread::sleep(self.delay);
                    attempt += 1;
                }
                Err(e) => {
                    warn!(call, attempts = self.attempts, error = %e, "data call failed, giving up");
                    return Err(e);
                }
            }
        }
    }
}

impl<P: MarketDataPort> MarketDataPort for RetryingDataPort<P> {
    fn trading_days(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, NavtraderError> {
        self.with_retry("trading_days", |p| p.trading_days(start, end))
    }

    fn open_prices(
        &self,
        date: NaiveDate,
        symbols: &[String],
    ) -> Result<PriceQuote, NavtraderError> {
        self.with_retry("open_prices", |p| p.open_prices(date, symbols))
    }

    fn close_prices(
        &self,
        date: NaiveDate,
        symbols: &[String],
    ) -> Result<PriceQuote, NavtraderError> {
        self.with_retry("close_prices", |p| p.close_prices(date, symbols))
    }

    fn index_close_series(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<IndexClose>>, NavtraderError> {
        self.with_retry("index_close_series", |p| p.index_close_series(code, start, end))
    }
}
