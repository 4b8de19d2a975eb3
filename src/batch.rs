//! Batch coordinator.
//!
//! Drives every valid inventory record through the archive executor and the
//! deletion gate, then folds the results into a [`BatchSummary`].
//!
//! # Per-record order
//!
//! 1. Contradiction check (delete without archive). Flagged records make no
//!    external calls at all.
//! 2. Archive executor, when archive is requested.
//! 3. Deletion gate, always evaluated so every record ends with a definite
//!    delete outcome.
//!
//! Records never share mutable state. With `concurrency > 1` several
//! records are in flight at once, but each record still finishes its
//! archive before its delete is evaluated, and the summary keeps inventory
//! order.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

use crate::archive;
use crate::deletion::{self, DeleteDecision};
use crate::inventory::Inventory;
use crate::item_kind::ItemKind;
use crate::layout::ArchiveLayout;
use crate::models::ItemRecord;
use crate::progress::{BatchProgress, BatchProgressEvent};
use crate::report::{summarize, BatchSummary};
use crate::traits::GisClient;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Records processed at the same time. Values below 1 act as 1.
    pub concurrency: usize,
    /// Process only the first N valid records.
    pub limit: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            limit: None,
        }
    }
}

/// Run one batch to completion. Never fails: every problem is recorded on
/// the item it belongs to.
pub async fn run(
    inventory: Inventory,
    client: &dyn GisClient,
    layout: &ArchiveLayout,
    options: &BatchOptions,
    progress: &dyn BatchProgress,
) -> BatchSummary {
    let Inventory {
        mut records,
        rejected,
    } = inventory;

    let not_processed = match options.limit {
        Some(limit) if limit < records.len() => records.split_off(limit),
        _ => Vec::new(),
    };
    if !not_processed.is_empty() {
        info!(skipped = not_processed.len(), "rows past the limit are not processed");
    }

    let total = records.len() as u64;
    let done = AtomicU64::new(0);
    progress.report(BatchProgressEvent::Started { total });
    info!(records = total, rejected = rejected.len(), "batch started");

    let finished: Vec<ItemRecord> = stream::iter(records)
        .map(|record| {
            let done = &done;
            async move {
                let record = process_record(record, client, layout).await;
                let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                progress.report(BatchProgressEvent::Item {
                    n,
                    total,
                    item_id: record.item_id.clone(),
                    archive: record.archive_outcome(),
                    delete: record.delete_outcome(),
                });
                record
            }
        })
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

    let summary = summarize(finished, rejected).with_not_processed(not_processed);
    info!(
        archived = summary.counts.archived_ok,
        archive_failed = summary.counts.archive_failed,
        deleted = summary.counts.deleted_ok,
        delete_failed = summary.counts.delete_failed,
        "batch finished"
    );
    summary
}

/// Take one record through contradiction check, archive and delete.
pub async fn process_record(
    mut record: ItemRecord,
    client: &dyn GisClient,
    layout: &ArchiveLayout,
) -> ItemRecord {
    if record.is_contradiction() {
        warn!(
            row = record.row,
            item_id = %record.item_id,
            "delete requested without archive; item left untouched"
        );
        record.flag_contradiction();
    } else if record.archive_requested {
        let result = archive::archive(&record, client, layout).await;
        record.apply_archive(result);
    }

    let result = deletion::maybe_delete(&record, client).await;
    record.apply_delete(result);
    record
}

/// What `run` would do for one record, without calling anything.
#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub row: usize,
    pub item_id: String,
    pub item_type: String,
    pub kind: ItemKind,
    pub archive: bool,
    /// Deletion gate decision, assuming the archive succeeds.
    pub delete: DeleteDecision,
}

/// Dry run of the batch. Assumes every requested archive of an exportable
/// item type succeeds, so the plan shows the most that `run` could delete.
pub fn plan(inventory: &Inventory) -> Vec<PlanEntry> {
    inventory
        .records
        .iter()
        .map(|rec| {
            let kind = ItemKind::classify(&rec.item_type);
            let delete = match deletion::decide(rec) {
                DeleteDecision::ArchiveNotConfirmed
                    if rec.archive_requested && kind.is_archivable() =>
                {
                    DeleteDecision::Authorized
                }
                other => other,
            };
            PlanEntry {
                row: rec.row,
                item_id: rec.item_id.clone(),
                item_type: rec.item_type.clone(),
                kind,
                archive: rec.archive_requested,
                delete,
            }
        })
        .collect()
}
