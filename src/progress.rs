//! Batch progress reporting.
//!
//! Reports per-item progress during `gis-archive run` so operators can see
//! how far through the inventory the batch is. Progress goes to **stderr**
//! so the summary table on stdout stays parseable.

use std::io::{IsTerminal, Write};

use crate::models::{ArchiveOutcome, DeleteOutcome};

/// A single progress event for a batch.
#[derive(Clone, Debug)]
pub enum BatchProgressEvent {
    /// The batch is about to process `total` records.
    Started { total: u64 },
    /// Record `n` of `total` finished.
    Item {
        n: u64,
        total: u64,
        item_id: String,
        archive: ArchiveOutcome,
        delete: DeleteOutcome,
    },
}

/// Reports batch progress. Implementations write to stderr (human or JSON).
pub trait BatchProgress: Send + Sync {
    /// Emit a progress event. Called from the batch coordinator.
    fn report(&self, event: BatchProgressEvent);
}

/// Human-friendly progress on stderr: "archive  12 / 1,500  abc123  archived, deleted".
pub struct StderrProgress;

impl BatchProgress for StderrProgress {
    fn report(&self, event: BatchProgressEvent) {
        let line = human_line(&event);
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

fn human_line(event: &BatchProgressEvent) -> String {
    match event {
        BatchProgressEvent::Started { total } => {
            format!("archive  starting  {} items\n", format_number(*total))
        }
        BatchProgressEvent::Item {
            n,
            total,
            item_id,
            archive,
            delete,
        } => format!(
            "archive  {} / {}  {}  {}, delete {}\n",
            format_number(*n),
            format_number(*total),
            item_id,
            archive,
            delete
        ),
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BatchProgress for JsonProgress {
    fn report(&self, event: BatchProgressEvent) {
        if let Ok(line) = serde_json::to_string(&json_event(&event)) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

fn json_event(event: &BatchProgressEvent) -> serde_json::Value {
    match event {
        BatchProgressEvent::Started { total } => serde_json::json!({
            "event": "started",
            "total": total
        }),
        BatchProgressEvent::Item {
            n,
            total,
            item_id,
            archive,
            delete,
        } => serde_json::json!({
            "event": "item",
            "n": n,
            "total": total,
            "item_id": item_id,
            "archive": archive,
            "delete": delete
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BatchProgress for NoProgress {
    fn report(&self, _event: BatchProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a terminal, otherwise off.
    pub fn default_for_tty() -> Self {
        if std::io::stderr().is_terminal() {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BatchProgress> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
