//! Archive executor.
//!
//! Exports one item through the [`GisClient`] and writes the result into
//! the item's archive folder. Every failure is turned into an
//! [`ArchiveResult`] with `outcome = Failure`; nothing here returns an
//! error to the caller.
//!
//! # Workflow
//!
//! 1. Create `<root>/<owner>/<item_id>/` (fails if it already exists).
//! 2. Call `export_item`.
//! 3. Write every artifact file and build the SHA-256 manifest.
//! 4. On failure after step 1, leave `<type>_error.json` in the folder.

use tracing::{info, warn};

use crate::layout::{ArchiveLayout, ErrorRecord};
use crate::models::{ArchiveResult, ItemRecord};
use crate::traits::GisClient;

pub async fn archive(
    record: &ItemRecord,
    client: &dyn GisClient,
    layout: &ArchiveLayout,
) -> ArchiveResult {
    let dir = match layout.prepare_item_dir(&record.owner, &record.item_id) {
        Ok(dir) => dir,
        Err(e) => {
            warn!(item_id = %record.item_id, error = %e, "cannot prepare archive folder");
            return ArchiveResult::failure(e.to_string());
        }
    };

    let artifact = match client.export_item(&record.item_id).await {
        Ok(artifact) => artifact,
        Err(e) => {
            let detail = e.to_string();
            warn!(item_id = %record.item_id, error = %detail, "export failed");
            leave_error_record(record, layout, &dir, &detail);
            return ArchiveResult::failure(detail);
        }
    };

    match layout.materialize(&dir, &record.item_id, &artifact) {
        Ok(files) => {
            info!(
                item_id = %record.item_id,
                files = files.len(),
                location = %dir.display(),
                "archived"
            );
            ArchiveResult::success(dir, files)
        }
        Err(e) => {
            let detail = e.to_string();
            warn!(item_id = %record.item_id, error = %detail, "cannot write artifact");
            leave_error_record(record, layout, &dir, &detail);
            ArchiveResult::failure(detail)
        }
    }
}

fn leave_error_record(
    record: &ItemRecord,
    layout: &ArchiveLayout,
    dir: &std::path::Path,
    detail: &str,
) {
    let error_record = ErrorRecord {
        itemname: record.display_name(),
        itemid: &record.item_id,
        download_error: detail,
    };
    if let Err(e) = layout.write_error_record(dir, &record.item_type, &error_record) {
        warn!(item_id = %record.item_id, error = %e, "cannot write error record");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GisError;
    use crate::models::ArchiveOutcome;
    use crate::traits::{Artifact, ArtifactFile};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct OneFile;

    #[async_trait]
    impl GisClient for OneFile {
        async fn export_item(&self, item_id: &str) -> Result<Artifact, GisError> {
            Ok(Artifact::single(ArtifactFile::new(
                format!("{}.zip", item_id),
                vec![1, 2, 3],
            )))
        }
        async fn delete_item(&self, _item_id: &str) -> Result<(), GisError> {
            unreachable!("archive never deletes")
        }
    }

    struct Broken;

    #[async_trait]
    impl GisClient for Broken {
        async fn export_item(&self, _item_id: &str) -> Result<Artifact, GisError> {
            Err(GisError::Portal {
                code: 500,
                message: "Unable to export".to_string(),
            })
        }
        async fn delete_item(&self, _item_id: &str) -> Result<(), GisError> {
            unreachable!("archive never deletes")
        }
    }

    fn record() -> ItemRecord {
        ItemRecord::new("abc", true, true)
            .with_owner("jdoe")
            .with_type("Feature Service")
    }

    #[tokio::test]
    async fn test_success_sets_location_and_manifest() {
        let tmp = TempDir::new().unwrap();
        let layout = ArchiveLayout::new(tmp.path()).unwrap();
        let result = archive(&record(), &OneFile, &layout).await;
        assert_eq!(result.outcome, ArchiveOutcome::Success);
        assert_eq!(result.location, Some(tmp.path().join("jdoe").join("abc")));
        assert_eq!(result.files.len(), 1);
        assert!(tmp.path().join("jdoe/abc/abc.zip").exists());
    }

    #[tokio::test]
    async fn test_client_error_becomes_failure_with_error_record() {
        let tmp = TempDir::new().unwrap();
        let layout = ArchiveLayout::new(tmp.path()).unwrap();
        let result = archive(&record(), &Broken, &layout).await;
        assert_eq!(result.outcome, ArchiveOutcome::Failure);
        assert!(result.location.is_none());
        assert!(result.error.unwrap().contains("Unable to export"));
        assert!(tmp
            .path()
            .join("jdoe/abc/Feature Service_error.json")
            .exists());
    }

    #[tokio::test]
    async fn test_existing_folder_is_failure_without_export() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("jdoe/abc")).unwrap();
        let layout = ArchiveLayout::new(tmp.path()).unwrap();
        // Broken would leave an error record if it were called.
        let result = archive(&record(), &Broken, &layout).await;
        assert_eq!(result.outcome, ArchiveOutcome::Failure);
        assert!(result.error.unwrap().contains("already exists"));
        assert!(!tmp
            .path()
            .join("jdoe/abc/Feature Service_error.json")
            .exists());
    }
}
