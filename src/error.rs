//! Typed errors for the GIS client and the archive layout.
//!
//! Command-level code wraps these in `anyhow` with context; the pipeline
//! turns them into per-item [`ItemError`](crate::models::ItemError) values.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`GisClient`](crate::traits::GisClient).
#[derive(Debug, Error)]
pub enum GisError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("portal returned HTTP {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("portal error {code}: {message}")]
    Portal { code: i64, message: String },

    #[error("unexpected response from {url}: {detail}")]
    Response { url: String, detail: String },

    #[error("{item_type}: {reason}")]
    NotExportable { item_type: String, reason: String },

    #[error("export job {job_id} failed: {message}")]
    ExportFailed { job_id: String, message: String },

    #[error("export job {job_id} did not complete within {secs}s")]
    ExportTimeout { job_id: String, secs: u64 },

    #[error("failed to pack resources: {0}")]
    Pack(String),
}

/// Errors raised while deriving or writing archive locations.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("output root is not an existing directory: {0}")]
    MissingRoot(PathBuf),

    #[error("artifact location already exists: {0}")]
    Collision(PathBuf),

    #[error("invalid path component {0:?}")]
    InvalidComponent(String),

    #[error("artifact for item {0} contains no files")]
    EmptyArtifact(String),

    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LayoutError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LayoutError::Io {
            path: path.into(),
            source,
        }
    }
}
