//! One JSON document per run on the local filesystem.

use super::{RunStore, StoredRun};
use crate::context::PipelineContext;
use crate::errors::StoreError;
use crate::registry::{RunLogEntry, RunRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Writes `run_<id>.json` under a directory, rewriting it on every call.
#[derive(Debug)]
pub struct JsonFileRunStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles on the documents.
    lock: Mutex<()>,
}

impl JsonFileRunStore {
    /// Creates a store rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the document path for a run.
    #[must_use]
    pub fn path_for(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("run_{run_id}.json"))
    }

    /// Returns the root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads a stored run back.
    pub async fn load(&self, run_id: &str) -> Result<StoredRun, StoreError> {
        let bytes = tokio::fs::read(self.path_for(run_id)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write(&self, stored: &StoredRun) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&stored.record.run_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(stored)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl RunStore for JsonFileRunStore {
    async fn create_run(&self, record: &RunRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.write(&StoredRun {
            record: record.clone(),
            result: None,
        })
        .await
    }

    async fn append_log(&self, run_id: &str, entry: &RunLogEntry) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut stored = self.load(run_id).await?;
        stored.record.logs.push(entry.clone());
        self.write(&stored).await
    }

    async fn set_final_result(
        &self,
        record: &RunRecord,
        result: Option<PipelineContext>,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.write(&StoredRun {
            record: record.clone(),
            result,
        })
        .await
    }
}
