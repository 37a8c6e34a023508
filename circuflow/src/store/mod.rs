//! Persistence collaborator for run records.
//!
//! The orchestrator forwards every record change to a [`RunStore`] on a
//! best-effort basis. A failing store is logged and otherwise ignored; it
//! never changes the outcome of a run.

mod json_file;

pub use json_file::JsonFileRunStore;

use crate::context::PipelineContext;
use crate::errors::StoreError;
use crate::registry::{RunLogEntry, RunRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Async persistence interface for run records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persists a freshly registered run.
    async fn create_run(&self, record: &RunRecord) -> Result<(), StoreError>;

    /// Appends one log entry to a run.
    async fn append_log(&self, run_id: &str, entry: &RunLogEntry) -> Result<(), StoreError>;

    /// Persists the terminal record and, for completed runs, the final context.
    async fn set_final_result(
        &self,
        record: &RunRecord,
        result: Option<PipelineContext>,
    ) -> Result<(), StoreError>;
}

/// A store that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRunStore;

#[async_trait]
impl RunStore for NoOpRunStore {
    async fn create_run(&self, _record: &RunRecord) -> Result<(), StoreError> {
        Ok(())
    }

    async fn append_log(&self, _run_id: &str, _entry: &RunLogEntry) -> Result<(), StoreError> {
        Ok(())
    }

    async fn set_final_result(
        &self,
        _record: &RunRecord,
        _result: Option<PipelineContext>,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A stored run as kept by [`InMemoryRunStore`] and [`JsonFileRunStore`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoredRun {
    /// The last persisted record.
    pub record: RunRecord,
    /// The final context, once the run completed.
    #[serde(default)]
    pub result: Option<PipelineContext>,
}

/// A store holding runs in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<String, StoredRun>>,
}

impl InMemoryRunStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored run, if any.
    #[must_use]
    pub fn get(&self, run_id: &str) -> Option<StoredRun> {
        self.runs.read().get(run_id).cloned()
    }

    /// Returns the number of stored runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create_run(&self, record: &RunRecord) -> Result<(), StoreError> {
        self.runs.write().insert(
            record.run_id.clone(),
            StoredRun {
                record: record.clone(),
                result: None,
            },
        );
        Ok(())
    }

    async fn append_log(&self, run_id: &str, entry: &RunLogEntry) -> Result<(), StoreError> {
        let mut runs = self.runs.write();
        let stored = runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::Backend(format!("unknown run: {run_id}")))?;
        stored.record.logs.push(entry.clone());
        Ok(())
    }

    async fn set_final_result(
        &self,
        record: &RunRecord,
        result: Option<PipelineContext>,
    ) -> Result<(), StoreError> {
        self.runs.write().insert(
            record.run_id.clone(),
            StoredRun {
                record: record.clone(),
                result,
            },
        );
        Ok(())
    }
}
