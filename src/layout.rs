//! Archive folder layout and artifact materialization.
//!
//! Every item is archived into `<output_root>/<owner>/<item_id>/`. The
//! output root must already exist; owner and item folders are created
//! on demand. Creating the item folder is the collision check: if it is
//! already there, the item is not archived again and nothing inside it is
//! touched.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::LayoutError;
use crate::models::ArchivedFile;
use crate::traits::Artifact;

/// Contents of `<type>_error.json`, written when an item fails to archive.
#[derive(Debug, Serialize)]
pub struct ErrorRecord<'a> {
    pub itemname: &'a str,
    pub itemid: &'a str,
    pub download_error: &'a str,
}

#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
}

impl ArchiveLayout {
    /// Bind the layout to an existing output root.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, LayoutError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(LayoutError::MissingRoot(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic folder for an item. Does not touch the filesystem.
    pub fn item_dir(&self, owner: &str, item_id: &str) -> Result<PathBuf, LayoutError> {
        check_component(owner)?;
        check_component(item_id)?;
        Ok(self.root.join(owner).join(item_id))
    }

    /// Create the item folder, failing with [`LayoutError::Collision`] if
    /// it already exists.
    pub fn prepare_item_dir(&self, owner: &str, item_id: &str) -> Result<PathBuf, LayoutError> {
        let dir = self.item_dir(owner, item_id)?;
        let owner_dir = self.root.join(owner);

        match fs::create_dir(&owner_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(LayoutError::io(owner_dir, e)),
        }

        match fs::create_dir(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(LayoutError::Collision(dir)),
            Err(e) => Err(LayoutError::io(dir, e)),
        }
    }

    /// Write every artifact file into `dir`, returning the manifest.
    ///
    /// Files are created with `create_new`, so a duplicate name inside one
    /// artifact is a collision rather than a silent overwrite.
    pub fn materialize(
        &self,
        dir: &Path,
        item_id: &str,
        artifact: &Artifact,
    ) -> Result<Vec<ArchivedFile>, LayoutError> {
        if artifact.is_empty() {
            return Err(LayoutError::EmptyArtifact(item_id.to_string()));
        }

        let mut manifest = Vec::with_capacity(artifact.files.len());
        for file in &artifact.files {
            check_component(&file.name)?;
            let path = dir.join(&file.name);
            let mut out = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(LayoutError::Collision(path));
                }
                Err(e) => return Err(LayoutError::io(path, e)),
            };
            out.write_all(&file.bytes)
                .and_then(|_| out.sync_all())
                .map_err(|e| LayoutError::io(&path, e))?;

            manifest.push(ArchivedFile {
                name: file.name.clone(),
                bytes: file.bytes.len() as u64,
                sha256: hex_sha256(&file.bytes),
            });
        }
        Ok(manifest)
    }

    /// Write `<item_type>_error.json` into `dir`.
    pub fn write_error_record(
        &self,
        dir: &Path,
        item_type: &str,
        record: &ErrorRecord<'_>,
    ) -> Result<PathBuf, LayoutError> {
        let stem = if item_type.trim().is_empty() {
            "item".to_string()
        } else {
            sanitize_file_name(item_type)
        };
        let path = dir.join(format!("{}_error.json", stem));
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| LayoutError::io(&path, std::io::Error::other(e)))?;
        fs::write(&path, json).map_err(|e| LayoutError::io(&path, e))?;
        Ok(path)
    }
}

/// Replace characters that cannot appear in a single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

fn check_component(part: &str) -> Result<(), LayoutError> {
    let bad = part.is_empty()
        || part == "."
        || part == ".."
        || part.contains('/')
        || part.contains('\\')
        || part.contains('\0');
    if bad {
        return Err(LayoutError::InvalidComponent(part.to_string()));
    }
    Ok(())
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
