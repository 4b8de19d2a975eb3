//! In-memory `GisClient` for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gis_archive::error::GisError;
use gis_archive::traits::{Artifact, ArtifactFile, GisClient};

#[derive(Default)]
struct FakeState {
    /// Export payload per item id; items without one get a generated file.
    payloads: HashMap<String, Vec<u8>>,
    fail_export: HashSet<String>,
    fail_delete: HashSet<String>,
    /// Every call in order, as `export:<id>` / `delete:<id>`.
    calls: Vec<String>,
    export_delay: HashMap<String, Duration>,
}

/// Fake portal that records every call.
///
/// - exports succeed with one `<id>.bin` file unless `fail_export_for`
/// - deletes succeed unless `fail_delete_for`
#[derive(Clone, Default)]
pub struct FakeGisClient {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGisClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_payload(&self, item_id: &str, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.payloads.insert(item_id.to_string(), bytes.to_vec());
    }

    pub fn fail_export_for(&self, item_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_export.insert(item_id.to_string());
    }

    pub fn fail_delete_for(&self, item_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_delete.insert(item_id.to_string());
    }

    /// Make the export of `item_id` take `delay` before answering.
    pub fn delay_export(&self, item_id: &str, delay: Duration) {
        let mut state = self.state.lock().unwrap();
        state.export_delay.insert(item_id.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn export_calls(&self) -> Vec<String> {
        self.calls_with_prefix("export:")
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.calls_with_prefix("delete:")
    }

    fn calls_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| c.strip_prefix(prefix).map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl GisClient for FakeGisClient {
    async fn export_item(&self, item_id: &str) -> Result<Artifact, GisError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("export:{}", item_id));
            state.export_delay.get(item_id).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        if state.fail_export.contains(item_id) {
            return Err(GisError::Portal {
                code: 500,
                message: format!("export of {} failed", item_id),
            });
        }
        let bytes = state
            .payloads
            .get(item_id)
            .cloned()
            .unwrap_or_else(|| format!("content-of-{}", item_id).into_bytes());
        Ok(Artifact::single(ArtifactFile::new(
            format!("{}.bin", item_id),
            bytes,
        )))
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), GisError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete:{}", item_id));
        if state.fail_delete.contains(item_id) {
            return Err(GisError::Portal {
                code: 403,
                message: "You do not have permissions to access this resource or perform this operation."
                    .to_string(),
            });
        }
        Ok(())
    }
}
