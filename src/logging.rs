//! Tracing setup for the CLI.
//!
//! Log lines always go to stderr. When `logging.dir` is set, each run also
//! writes `archive_items_<HHhMMmSSs>.log` in that directory so there is a
//! per-run trail next to the report.
//!
//! `RUST_LOG` overrides `logging.level`:
//! - `RUST_LOG=debug gis-archive run`
//! - `RUST_LOG=gis_archive::arcgis=debug gis-archive run`

use anyhow::{Context, Result};
use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// Returns a guard when a log file is in use; keep it alive until exit or
/// buffered lines are lost.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid logging.level: {}", config.level))?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, log_file_name());
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn log_file_name() -> String {
    format!("archive_items_{}.log", Local::now().format("%Hh%Mm%Ss"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name_shape() {
        let name = log_file_name();
        assert!(name.starts_with("archive_items_"));
        assert!(name.ends_with("s.log"));
        assert_eq!(name.len(), "archive_items_00h00m00s.log".len());
    }
}
