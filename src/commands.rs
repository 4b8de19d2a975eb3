//! CLI command implementations: `check`, `plan`, `run`.
//!
//! Each command takes a validated [`Config`], prints its result to stdout,
//! and returns `anyhow::Result` so startup failures exit non-zero with
//! context. Per-item failures inside `run` never surface here; they are
//! part of the summary.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::arcgis::ArcGisClient;
use crate::batch::{self, BatchOptions};
use crate::config::Config;
use crate::inventory::{load_inventory, Inventory};
use crate::layout::ArchiveLayout;
use crate::progress::BatchProgress;
use crate::report;

/// Settings for `gis-archive run` that may come from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub limit: Option<usize>,
    /// Overrides `archive.concurrency`.
    pub concurrency: Option<usize>,
    /// Report file; defaults to a timestamped file in the output root.
    pub report: Option<PathBuf>,
}

/// Verify everything `run` needs before touching any item.
pub async fn run_check(config: &Config) -> Result<()> {
    let inventory = load_inventory(&config.inventory.path, &config.inventory)?;
    let layout = ArchiveLayout::new(&config.archive.output_root)?;

    println!("{:<12} {:<8} DETAIL", "CHECK", "STATUS");
    println!(
        "{:<12} {:<8} {} valid, {} rejected",
        "inventory",
        "OK",
        inventory.records.len(),
        inventory.rejected.len()
    );
    println!(
        "{:<12} {:<8} {}",
        "output_root",
        "OK",
        layout.root().display()
    );

    ArcGisClient::connect(&config.portal, &config.archive).await?;
    println!(
        "{:<12} {:<8} {} ({})",
        "portal", "OK", config.portal.url, config.portal.username
    );

    for rejected in &inventory.rejected {
        println!("  rejected {}", rejected);
    }
    Ok(())
}

/// Print what `run` would do for each row, with no portal calls.
pub fn run_plan(config: &Config) -> Result<()> {
    let inventory = load_inventory(&config.inventory.path, &config.inventory)?;
    warn_duplicates(&inventory);

    let entries = batch::plan(&inventory);
    println!(
        "{:<5} {:<34} {:<26} {:<8} {:<14}",
        "ROW", "ITEM", "TYPE", "ARCHIVE", "DELETE"
    );
    for entry in &entries {
        let archive = if !entry.archive {
            "-".to_string()
        } else if entry.kind.is_archivable() {
            "yes".to_string()
        } else {
            "no-export".to_string()
        };
        println!(
            "{:<5} {:<34} {:<26} {:<8} {:<14}",
            entry.row,
            entry.item_id,
            entry.item_type,
            archive,
            entry.delete.to_string()
        );
    }
    for rejected in &inventory.rejected {
        println!("  rejected {}", rejected);
    }

    println!();
    println!(
        "{} rows: {} valid, {} rejected",
        inventory.row_count(),
        inventory.records.len(),
        inventory.rejected.len()
    );
    Ok(())
}

/// Archive, then conditionally delete, every valid row.
pub async fn run_archive(
    config: &Config,
    args: &RunArgs,
    progress: &dyn BatchProgress,
) -> Result<()> {
    let inventory = load_inventory(&config.inventory.path, &config.inventory)?;
    warn_duplicates(&inventory);

    let layout = ArchiveLayout::new(&config.archive.output_root)?;
    let client = ArcGisClient::connect(&config.portal, &config.archive).await?;

    let options = BatchOptions {
        concurrency: args.concurrency.unwrap_or(config.archive.concurrency),
        limit: args.limit,
    };
    let summary = batch::run(inventory, &client, &layout, &options, progress).await;

    report::print_summary(&summary);

    let path = args
        .report
        .clone()
        .unwrap_or_else(|| report::default_report_path(layout.root(), Utc::now()));
    report::write_json(&summary, &path)
        .with_context(|| "Batch finished but the report could not be saved")?;
    info!(path = %path.display(), "report written");
    println!("Report: {}", path.display());

    Ok(())
}

fn warn_duplicates(inventory: &Inventory) {
    for id in inventory.duplicate_ids() {
        warn!(item_id = %id, "item appears on more than one inventory row");
    }
}
