//! Report generation port trait.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::NavtraderError;
use std::path::Path;

/// Port for writing backtest artifacts.
pub trait ReportPort {
    fn write(&self, report: &BacktestReport<'_>, output_dir: &Path) -> Result<(), NavtraderError>;
}
