//! # GIS Archive CLI (`gis-archive`)
//!
//! ## Usage
//!
//! ```bash
//! gis-archive --config ./config/gis-archive.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gis-archive check` | Validate config and inventory, log in, verify the user id |
//! | `gis-archive plan` | Print the per-row archive/delete decision without portal calls |
//! | `gis-archive run` | Archive flagged items, delete the ones that archived, write a report |
//!
//! ## Examples
//!
//! ```bash
//! # Try the first 20 rows with four items in flight
//! gis-archive run --limit 20 --concurrency 4
//!
//! # JSON progress for a log collector, report to a fixed path
//! gis-archive run --progress json --report ./reports/latest.json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gis_archive::commands::{self, RunArgs};
use gis_archive::config;
use gis_archive::logging;
use gis_archive::progress::ProgressMode;

/// GIS Archive: export Web GIS items, then delete the ones that archived.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. The portal password is read from the environment variable named by
/// `portal.password_env`.
#[derive(Parser)]
#[command(
    name = "gis-archive",
    about = "Archive Web GIS content items and delete them only after a successful archive",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gis-archive.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check config, inventory and portal login without changing anything.
    Check,

    /// Show what `run` would do for each inventory row.
    ///
    /// Makes no portal calls and writes nothing. Assumes every requested
    /// archive of an exportable item type succeeds.
    Plan,

    /// Run the batch: archive, then conditionally delete.
    Run {
        /// Process only the first N valid rows.
        #[arg(long)]
        limit: Option<usize>,

        /// Items processed at the same time (overrides `archive.concurrency`).
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        concurrency: Option<u16>,

        /// Where to write the JSON report.
        ///
        /// Defaults to `archive_report_<timestamp>.json` in the output root.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Progress on stderr: human, json, or off. Defaults to human on a
        /// terminal, off otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    let _log_guard = logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Check => {
            commands::run_check(&cfg).await?;
        }
        Commands::Plan => {
            commands::run_plan(&cfg)?;
        }
        Commands::Run {
            limit,
            concurrency,
            report,
            progress,
        } => {
            let args = RunArgs {
                limit,
                concurrency: concurrency.map(usize::from),
                report,
            };
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            commands::run_archive(&cfg, &args, reporter.as_ref()).await?;
        }
    }

    Ok(())
}
