//! Market data access port trait.

use crate::domain::error::NavtraderError;
use crate::domain::portfolio::PriceQuote;
use chrono::NaiveDate;

/// One row of a raw index close series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// Synchronous batch-fetch contract consumed by the engine.
///
/// Unknown symbols and dates are reported as `None` entries rather than
/// errors. An `Err` means the source itself failed; callers degrade to
/// "no data" instead of aborting.
pub trait MarketDataPort {
    /// Trading days in `[start, end]`, ascending. Empty when the source has
    /// no calendar for the range.
    fn trading_days(&self, start: NaiveDate, end: NaiveDate)
    -> Result<Vec<NaiveDate>, NavtraderError>;

    fn open_prices(&self, date: NaiveDate, symbols: &[String])
    -> Result<PriceQuote, NavtraderError>;

    fn close_prices(&self, date: NaiveDate, symbols: &[String])
    -> Result<PriceQuote, NavtraderError>;

    fn index_close_series(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<IndexClose>>, NavtraderError>;
}
