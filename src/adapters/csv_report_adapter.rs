//! CSV and JSON report adapter implementing ReportPort.

use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::domain::backtest::{BacktestReport, CycleDiagnostics};
use crate::domain::error::NavtraderError;
use crate::ports::report_port::ReportPort;

pub const NAV_FILE: &str = "nav_curve.csv";
pub const TRADES_FILE: &str = "trades.csv";
pub const BENCHMARK_NAV_FILE: &str = "benchmark_nav.csv";
pub const BASIC_METRICS_FILE: &str = "metrics_basic.json";
pub const BENCHMARK_METRICS_FILE: &str = "metrics_with_benchmark.json";
pub const DIAGNOSTICS_FILE: &str = "diagnostics.json";
/// Run log written next to the report by `backtest`.
pub const LOG_FILE: &str = "backtest.log";

pub struct CsvReportAdapter;

#[derive(Serialize)]
struct DiagnosticsFile<'a> {
    cycles: &'a [CycleDiagnostics],
    skipped: &'a [chrono::NaiveDate],
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &BacktestReport<'_>, output_dir: &Path) -> Result<(), NavtraderError> {
        fs::create_dir_all(output_dir)?;

        write_csv(&output_dir.join(NAV_FILE), &report.result.nav)?;
        write_csv(&output_dir.join(TRADES_FILE), &report.result.trades)?;
        write_json(&output_dir.join(BASIC_METRICS_FILE), &report.basic)?;
        write_json(
            &output_dir.join(DIAGNOSTICS_FILE),
            &DiagnosticsFile {
                cycles: &report.result.cycles,
                skipped: &report.result.skipped,
            },
        )?;

        if let Some(benchmark) = report.benchmark {
            write_csv(&output_dir.join(BENCHMARK_NAV_FILE), benchmark)?;
            write_json(&output_dir.join(BENCHMARK_METRICS_FILE), &report.comparison)?;
        }

        info!(dir = %output_dir.display(), "report written");
        Ok(())
    }
}

/// Writes rows with a header derived from the row type. An empty slice
/// still produces the header line.
fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), NavtraderError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), NavtraderError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json + "\n")?;
    Ok(())
}
