//! Core data models used throughout the archive pipeline.
//!
//! An [`ItemRecord`] is built from one validated inventory row, carried
//! through the archive executor and the deletion gate, and finally folded
//! into the batch summary. The two outcome fields are only written through
//! [`ItemRecord::apply_archive`] and [`ItemRecord::apply_delete`], which the
//! archive and deletion modules call with the results they produce.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Result of the archive phase for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveOutcome {
    NotAttempted,
    Success,
    Failure,
}

/// Result of the delete phase for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    NotAttempted,
    Success,
    Failure,
    Skipped,
}

impl DeleteOutcome {
    /// True once the deletion gate has settled this record.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            DeleteOutcome::Success | DeleteOutcome::Failure | DeleteOutcome::Skipped
        )
    }
}

impl fmt::Display for ArchiveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArchiveOutcome::NotAttempted => "not attempted",
            ArchiveOutcome::Success => "archived",
            ArchiveOutcome::Failure => "failed",
        };
        f.write_str(s)
    }
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeleteOutcome::NotAttempted => "not attempted",
            DeleteOutcome::Success => "deleted",
            DeleteOutcome::Failure => "failed",
            DeleteOutcome::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Classification of a per-item problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Delete requested without archive requested.
    ConfigContradiction,
    /// Export/download failed, or the artifact could not be written.
    ArchiveFailure,
    /// An authorized delete call failed.
    DeleteFailure,
    /// An inventory value could not be validated.
    MalformedInput,
}

/// A classified error attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ItemError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// One file written into an item's archive folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedFile {
    pub name: String,
    pub bytes: u64,
    pub sha256: String,
}

/// What the archive executor reports back for one item.
#[derive(Debug, Clone)]
pub struct ArchiveResult {
    pub outcome: ArchiveOutcome,
    pub location: Option<PathBuf>,
    pub files: Vec<ArchivedFile>,
    pub error: Option<String>,
}

impl ArchiveResult {
    pub fn success(location: PathBuf, files: Vec<ArchivedFile>) -> Self {
        Self {
            outcome: ArchiveOutcome::Success,
            location: Some(location),
            files,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            outcome: ArchiveOutcome::Failure,
            location: None,
            files: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// What the deletion gate reports back for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    pub outcome: DeleteOutcome,
    pub error: Option<String>,
}

impl DeleteResult {
    pub fn outcome(outcome: DeleteOutcome) -> Self {
        Self {
            outcome,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            outcome: DeleteOutcome::Failure,
            error: Some(error.into()),
        }
    }
}

/// Per-item state for one batch.
#[derive(Debug, Clone, Serialize)]
pub struct ItemRecord {
    /// Spreadsheet row (header is row 1).
    pub row: usize,
    pub item_id: String,
    pub owner: String,
    pub item_type: String,
    pub title: Option<String>,
    pub archive_requested: bool,
    pub delete_requested: bool,
    archive_outcome: ArchiveOutcome,
    delete_outcome: DeleteOutcome,
    archive_output_location: Option<PathBuf>,
    files: Vec<ArchivedFile>,
    errors: Vec<ItemError>,
}

impl ItemRecord {
    pub fn new(item_id: impl Into<String>, archive_requested: bool, delete_requested: bool) -> Self {
        Self {
            row: 0,
            item_id: item_id.into(),
            owner: String::new(),
            item_type: String::new(),
            title: None,
            archive_requested,
            delete_requested,
            archive_outcome: ArchiveOutcome::NotAttempted,
            delete_outcome: DeleteOutcome::NotAttempted,
            archive_output_location: None,
            files: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    pub fn archive_outcome(&self) -> ArchiveOutcome {
        self.archive_outcome
    }

    pub fn delete_outcome(&self) -> DeleteOutcome {
        self.delete_outcome
    }

    pub fn archive_output_location(&self) -> Option<&PathBuf> {
        self.archive_output_location.as_ref()
    }

    pub fn files(&self) -> &[ArchivedFile] {
        &self.files
    }

    pub fn errors(&self) -> &[ItemError] {
        &self.errors
    }

    pub fn has_error(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    /// Delete requested without archive requested.
    pub fn is_contradiction(&self) -> bool {
        self.delete_requested && !self.archive_requested
    }

    /// Label used in logs and reports: the title when known, else the id.
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.item_id)
    }

    pub(crate) fn flag_contradiction(&mut self) {
        if !self.has_error(ErrorKind::ConfigContradiction) {
            self.errors.push(ItemError::new(
                ErrorKind::ConfigContradiction,
                "delete requested without archive requested",
            ));
        }
    }

    pub(crate) fn apply_archive(&mut self, result: ArchiveResult) {
        self.archive_outcome = result.outcome;
        match result.outcome {
            ArchiveOutcome::Success => {
                self.archive_output_location = result.location;
                self.files = result.files;
            }
            _ => {
                self.archive_output_location = None;
                self.files.clear();
            }
        }
        if let Some(detail) = result.error {
            self.errors
                .push(ItemError::new(ErrorKind::ArchiveFailure, detail));
        }
    }

    pub(crate) fn apply_delete(&mut self, result: DeleteResult) {
        // An already-settled delete outcome is never rewritten.
        if self.delete_outcome.is_final() {
            return;
        }
        self.delete_outcome = result.outcome;
        if let Some(detail) = result.error {
            self.errors.push(ItemError::new(ErrorKind::DeleteFailure, detail));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_starts_unattempted() {
        let rec = ItemRecord::new("abc", true, true);
        assert_eq!(rec.archive_outcome(), ArchiveOutcome::NotAttempted);
        assert_eq!(rec.delete_outcome(), DeleteOutcome::NotAttempted);
        assert!(rec.archive_output_location().is_none());
        assert!(rec.errors().is_empty());
    }

    #[test]
    fn test_contradiction_detection() {
        assert!(ItemRecord::new("a", false, true).is_contradiction());
        assert!(!ItemRecord::new("a", true, true).is_contradiction());
        assert!(!ItemRecord::new("a", false, false).is_contradiction());
    }

    #[test]
    fn test_flag_contradiction_once() {
        let mut rec = ItemRecord::new("a", false, true);
        rec.flag_contradiction();
        rec.flag_contradiction();
        assert_eq!(rec.errors().len(), 1);
        assert_eq!(rec.errors()[0].kind, ErrorKind::ConfigContradiction);
    }

    #[test]
    fn test_archive_failure_clears_location() {
        let mut rec = ItemRecord::new("a", true, false);
        rec.apply_archive(ArchiveResult::failure("boom"));
        assert_eq!(rec.archive_outcome(), ArchiveOutcome::Failure);
        assert!(rec.archive_output_location().is_none());
        assert!(rec.has_error(ErrorKind::ArchiveFailure));
    }

    #[test]
    fn test_final_delete_outcome_is_not_rewritten() {
        let mut rec = ItemRecord::new("a", true, true);
        rec.apply_delete(DeleteResult::outcome(DeleteOutcome::Skipped));
        rec.apply_delete(DeleteResult::outcome(DeleteOutcome::Success));
        assert_eq!(rec.delete_outcome(), DeleteOutcome::Skipped);
    }

    #[test]
    fn test_display_name_prefers_title() {
        let mut rec = ItemRecord::new("a1", true, false);
        assert_eq!(rec.display_name(), "a1");
        rec.title = Some("Parcels".to_string());
        assert_eq!(rec.display_name(), "Parcels");
    }
}
