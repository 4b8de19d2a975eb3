//! Batch summary: aggregation, display, and persistence.
//!
//! [`summarize`] is a pure fold over the finished records. The summary is
//! printed as a table on stdout and written as JSON next to the archive so
//! there is an auditable record of exactly which items were archived,
//! skipped, or deleted.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::inventory::MalformedInput;
use crate::models::{ArchiveOutcome, DeleteOutcome, ErrorKind, ItemRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    /// Every inventory row, processed or rejected.
    pub total: usize,
    pub archived_ok: usize,
    pub archive_failed: usize,
    pub deleted_ok: usize,
    pub delete_failed: usize,
    /// Deletes skipped because the archive was not confirmed.
    pub delete_skipped: usize,
    pub contradictions: usize,
    pub rejected: usize,
    /// Valid rows left untouched because the batch was limited.
    pub not_processed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    #[serde(flatten)]
    pub counts: BatchCounts,
    pub items: Vec<ItemRecord>,
    pub rejected_rows: Vec<MalformedInput>,
    /// Rows past the batch limit, both outcomes `not_attempted`.
    pub not_processed: Vec<ItemRecord>,
}

impl BatchSummary {
    /// True when no item needs operator attention.
    pub fn is_clean(&self) -> bool {
        let c = &self.counts;
        c.archive_failed == 0
            && c.delete_failed == 0
            && c.delete_skipped == 0
            && c.contradictions == 0
            && c.rejected == 0
            && c.not_processed == 0
    }

    /// Record rows the batch did not reach. They count toward `total`.
    pub fn with_not_processed(mut self, records: Vec<ItemRecord>) -> Self {
        self.counts.total += records.len();
        self.counts.not_processed += records.len();
        self.not_processed.extend(records);
        self
    }
}

pub fn summarize(records: Vec<ItemRecord>, rejected: Vec<MalformedInput>) -> BatchSummary {
    let mut counts = BatchCounts {
        total: records.len() + rejected.len(),
        rejected: rejected.len(),
        ..Default::default()
    };

    for rec in &records {
        match rec.archive_outcome() {
            ArchiveOutcome::Success => counts.archived_ok += 1,
            ArchiveOutcome::Failure => counts.archive_failed += 1,
            ArchiveOutcome::NotAttempted => {}
        }

        let contradiction = rec.has_error(ErrorKind::ConfigContradiction);
        if contradiction {
            counts.contradictions += 1;
        }

        match rec.delete_outcome() {
            DeleteOutcome::Success => counts.deleted_ok += 1,
            DeleteOutcome::Failure => counts.delete_failed += 1,
            DeleteOutcome::Skipped if !contradiction => counts.delete_skipped += 1,
            DeleteOutcome::Skipped | DeleteOutcome::NotAttempted => {}
        }
    }

    BatchSummary {
        counts,
        items: records,
        rejected_rows: rejected,
        not_processed: Vec::new(),
    }
}

#[derive(Serialize)]
struct ReportFile<'a> {
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    summary: &'a BatchSummary,
}

/// Default report path: `<dir>/archive_report_<yyyymmddTHHMMSS>.json`.
pub fn default_report_path(dir: &Path, now: DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "archive_report_{}.json",
        now.format("%Y%m%dT%H%M%S")
    ))
}

/// Write the summary as pretty JSON. The parent directory must exist.
pub fn write_json(summary: &BatchSummary, path: &Path) -> Result<()> {
    let file = ReportFile {
        generated_at: Utc::now(),
        summary,
    };
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

pub fn print_summary(summary: &BatchSummary) {
    let c = &summary.counts;

    println!("GIS Archive: Batch Summary");
    println!("===========================");
    println!();
    println!("  Rows:            {}", c.total);
    println!("  Archived:        {}", c.archived_ok);
    println!("  Archive failed:  {}", c.archive_failed);
    println!("  Deleted:         {}", c.deleted_ok);
    println!("  Delete failed:   {}", c.delete_failed);
    println!("  Delete skipped:  {}", c.delete_skipped);
    println!("  Contradictions:  {}", c.contradictions);
    println!("  Rejected rows:   {}", c.rejected);
    println!("  Not processed:   {}", c.not_processed);

    if !summary.items.is_empty() {
        println!();
        println!(
            "  {:<5} {:<34} {:<14} {:<14}   {}",
            "ROW", "ITEM", "ARCHIVE", "DELETE", "DETAIL"
        );
        println!("  {}", "-".repeat(86));
        for rec in &summary.items {
            let detail = rec
                .errors()
                .iter()
                .map(|e| e.detail.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            println!(
                "  {:<5} {:<34} {:<14} {:<14}   {}",
                rec.row,
                rec.item_id,
                rec.archive_outcome().to_string(),
                rec.delete_outcome().to_string(),
                detail
            );
        }
    }

    if !summary.rejected_rows.is_empty() {
        println!();
        println!("  Rejected:");
        for r in &summary.rejected_rows {
            println!("  {}", r);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArchiveResult, DeleteResult};
    use chrono::TimeZone;

    fn rec(id: &str, archive: Option<bool>, delete: Option<DeleteOutcome>) -> ItemRecord {
        let mut r = ItemRecord::new(id, archive.is_some(), delete.is_some());
        match archive {
            Some(true) => r.apply_archive(ArchiveResult::success(PathBuf::from("/x"), vec![])),
            Some(false) => r.apply_archive(ArchiveResult::failure("boom")),
            None => {}
        }
        if let Some(outcome) = delete {
            r.apply_delete(match outcome {
                DeleteOutcome::Failure => DeleteResult::failure("denied"),
                other => DeleteResult::outcome(other),
            });
        }
        r
    }

    #[test]
    fn test_counts() {
        let mut contradiction = ItemRecord::new("c", false, true);
        contradiction.flag_contradiction();
        contradiction.apply_delete(DeleteResult::outcome(DeleteOutcome::Skipped));

        let records = vec![
            rec("a", Some(true), Some(DeleteOutcome::Success)),
            rec("b", Some(false), Some(DeleteOutcome::Skipped)),
            rec("d", Some(true), Some(DeleteOutcome::Failure)),
            rec("e", Some(true), None),
            contradiction,
        ];
        let rejected = vec![MalformedInput {
            row: 9,
            item_id: None,
            column: "archiveFlag".to_string(),
            value: String::new(),
            reason: "is blank".to_string(),
        }];

        let summary = summarize(records, rejected);
        assert_eq!(
            summary.counts,
            BatchCounts {
                total: 6,
                archived_ok: 3,
                archive_failed: 1,
                deleted_ok: 1,
                delete_failed: 1,
                delete_skipped: 1,
                contradictions: 1,
                rejected: 1,
                not_processed: 0,
            }
        );
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_empty_batch_is_clean() {
        let summary = summarize(vec![], vec![]);
        assert_eq!(summary.counts, BatchCounts::default());
        assert!(summary.is_clean());
    }

    #[test]
    fn test_summarize_is_deterministic() {
        let make = || vec![rec("a", Some(true), Some(DeleteOutcome::Success))];
        let a = serde_json::to_value(summarize(make(), vec![])).unwrap();
        let b = serde_json::to_value(summarize(make(), vec![])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_not_processed_rows_count_toward_total() {
        let summary = summarize(vec![rec("a", Some(true), None)], vec![])
            .with_not_processed(vec![ItemRecord::new("b", true, true)]);
        assert_eq!(summary.counts.total, 2);
        assert_eq!(summary.counts.not_processed, 1);
        assert_eq!(summary.not_processed[0].archive_outcome(), ArchiveOutcome::NotAttempted);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_default_report_path() {
        let now = Utc.with_ymd_and_hms(2024, 7, 9, 13, 5, 0).unwrap();
        let path = default_report_path(Path::new("/out"), now);
        assert_eq!(path, PathBuf::from("/out/archive_report_20240709T130500.json"));
    }

    #[test]
    fn test_write_json_flattens_counts() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("report.json");
        let summary = summarize(vec![rec("a", Some(true), None)], vec![]);
        write_json(&summary, &path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["archived_ok"], 1);
        assert_eq!(json["items"][0]["item_id"], "a");
        assert_eq!(json["items"][0]["archive_outcome"], "success");
        assert!(json["generated_at"].is_string());
    }
}
