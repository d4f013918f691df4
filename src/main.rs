use clap::Parser;
use navtrader::adapters::csv_report_adapter::LOG_FILE;
use navtrader::cli::{log_dir, log_level, run, Cli};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(log_level(&cli).as_deref(), log_dir(&cli).as_deref());
    run(cli)
}

/// `RUST_LOG` wins over the config's `[log] level`, which wins over info.
/// Events go to stderr, and to `LOG_FILE` under `log_dir` when given.
fn init_tracing(config_level: Option<&str>, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = log_dir
        .and_then(|dir| {
            RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(LOG_FILE)
                .build(dir)
                .map_err(|e| eprintln!("warning: cannot open {}: {e}", dir.join(LOG_FILE).display()))
                .ok()
        })
        .map(|appender| fmt::layer().with_writer(appender).with_ansi(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
}
