//! Deletion gate.
//!
//! The only code path that calls [`GisClient::delete_item`]. A delete is
//! issued only when the record asked for both archive and delete and its
//! archive outcome is `Success`.
//!
//! | archive_requested | delete_requested | archive_outcome | result |
//! |---|---|---|---|
//! | false | true | any | Skipped (contradiction) |
//! | false | false | any | NotAttempted |
//! | true | false | any | NotAttempted |
//! | true | true | Success | delete → Success / Failure |
//! | true | true | Failure / NotAttempted | Skipped |
//!
//! A record whose delete outcome is already final is returned unchanged,
//! so evaluating the gate twice never sends a second delete.

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::models::{ArchiveOutcome, DeleteOutcome, DeleteResult, ItemRecord};
use crate::traits::GisClient;

/// What the gate would do for a record, before any call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteDecision {
    /// Delete not requested.
    NotRequested,
    /// Delete requested without archive requested.
    Contradiction,
    /// Delete requested but the archive did not succeed.
    ArchiveNotConfirmed,
    /// Delete may be called.
    Authorized,
    /// The gate already settled this record.
    AlreadyFinal(DeleteOutcome),
}

impl fmt::Display for DeleteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteDecision::NotRequested => f.write_str("keep"),
            DeleteDecision::Contradiction => f.write_str("contradiction"),
            DeleteDecision::ArchiveNotConfirmed => f.write_str("skip"),
            DeleteDecision::Authorized => f.write_str("delete"),
            DeleteDecision::AlreadyFinal(outcome) => write!(f, "done ({})", outcome),
        }
    }
}

pub fn decide(record: &ItemRecord) -> DeleteDecision {
    if record.delete_outcome().is_final() {
        return DeleteDecision::AlreadyFinal(record.delete_outcome());
    }
    if !record.delete_requested {
        return DeleteDecision::NotRequested;
    }
    if !record.archive_requested {
        return DeleteDecision::Contradiction;
    }
    match record.archive_outcome() {
        ArchiveOutcome::Success => DeleteDecision::Authorized,
        ArchiveOutcome::Failure | ArchiveOutcome::NotAttempted => {
            DeleteDecision::ArchiveNotConfirmed
        }
    }
}

pub async fn maybe_delete(record: &ItemRecord, client: &dyn GisClient) -> DeleteResult {
    match decide(record) {
        DeleteDecision::AlreadyFinal(outcome) => DeleteResult::outcome(outcome),
        DeleteDecision::NotRequested => DeleteResult::outcome(DeleteOutcome::NotAttempted),
        DeleteDecision::Contradiction => DeleteResult::outcome(DeleteOutcome::Skipped),
        DeleteDecision::ArchiveNotConfirmed => {
            info!(item_id = %record.item_id, "delete skipped: archive not confirmed");
            DeleteResult::outcome(DeleteOutcome::Skipped)
        }
        DeleteDecision::Authorized => match client.delete_item(&record.item_id).await {
            Ok(()) => {
                info!(item_id = %record.item_id, "deleted");
                DeleteResult::outcome(DeleteOutcome::Success)
            }
            Err(e) => {
                warn!(item_id = %record.item_id, error = %e, "delete failed");
                DeleteResult::failure(e.to_string())
            }
        },
    }
}
