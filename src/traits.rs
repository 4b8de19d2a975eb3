//! The GIS client seam.
//!
//! The pipeline only needs two capabilities from a Web GIS: export an item
//! into bytes, and remove an item. [`GisClient`] captures exactly that, so
//! the batch can run against the real ArcGIS REST client
//! ([`ArcGisClient`](crate::arcgis::ArcGisClient)) or an in-memory fake in
//! tests.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use gis_archive::error::GisError;
//! use gis_archive::traits::{Artifact, ArtifactFile, GisClient};
//!
//! struct StaticClient;
//!
//! #[async_trait]
//! impl GisClient for StaticClient {
//!     async fn export_item(&self, item_id: &str) -> Result<Artifact, GisError> {
//!         Ok(Artifact::single(ArtifactFile::new(
//!             format!("{}.json", item_id),
//!             b"{}".to_vec(),
//!         )))
//!     }
//!
//!     async fn delete_item(&self, _item_id: &str) -> Result<(), GisError> {
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::GisError;

/// One named file produced by an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    /// Plain file name (no directory separators).
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArtifactFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// The exported form of one item, not yet written anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    pub files: Vec<ArtifactFile>,
}

impl Artifact {
    pub fn single(file: ArtifactFile) -> Self {
        Self { files: vec![file] }
    }

    pub fn push(&mut self, file: ArtifactFile) {
        self.files.push(file);
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// An authenticated handle to the source Web GIS.
///
/// Shared read-only across the batch; implementations must tolerate
/// concurrent calls for different items.
#[async_trait]
pub trait GisClient: Send + Sync {
    /// Export or download the item's content.
    async fn export_item(&self, item_id: &str) -> Result<Artifact, GisError>;

    /// Remove the item from the GIS.
    async fn delete_item(&self, item_id: &str) -> Result<(), GisError>;
}
