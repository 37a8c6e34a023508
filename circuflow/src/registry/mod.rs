//! Process-wide table of runs, readable while runs are in flight.
//!
//! The registry is the only shared mutable state in the engine. Each entry
//! has exactly one writer, the [`RunHandle`] returned by
//! [`RunRegistry::register`], and any number of readers. Readers always get
//! a cloned snapshot, so a poller never sees a half-applied update.

mod record;

pub use record::{LogLevel, RunLogEntry, RunRecord, RunStatus, RunSummary};

use crate::context::PipelineContext;
use crate::core::StageResult;
use crate::errors::{CircuflowError, Result};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct RunEntry {
    record: RunRecord,
    result: Option<PipelineContext>,
    history: Vec<StageResult>,
}

type SharedEntry = Arc<RwLock<RunEntry>>;

/// Concurrent run table. Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    runs: Arc<DashMap<String, SharedEntry>>,
}

impl RunRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending run and returns its writer handle.
    ///
    /// # Errors
    ///
    /// Returns [`CircuflowError::DuplicateRun`] if the id is already taken.
    pub fn register(&self, run_id: impl Into<String>) -> Result<RunHandle> {
        let run_id = run_id.into();
        match self.runs.entry(run_id.clone()) {
            Entry::Occupied(_) => Err(CircuflowError::DuplicateRun { run_id }),
            Entry::Vacant(slot) => {
                let entry = Arc::new(RwLock::new(RunEntry {
                    record: RunRecord::pending(run_id.clone()),
                    result: None,
                    history: Vec::new(),
                }));
                slot.insert(Arc::clone(&entry));
                debug!(run_id = %run_id, "Registered run");
                Ok(RunHandle { run_id, entry })
            }
        }
    }

    /// Registers a run under a fresh UUID.
    pub fn register_new(&self) -> Result<RunHandle> {
        self.register(uuid::Uuid::new_v4().to_string())
    }

    fn entry(&self, run_id: &str) -> Result<SharedEntry> {
        self.runs
            .get(run_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| CircuflowError::run_not_found(run_id))
    }

    /// Returns a snapshot of the run's record.
    pub fn get_status(&self, run_id: &str) -> Result<RunRecord> {
        Ok(self.entry(run_id)?.read().record.clone())
    }

    /// Returns the final context of a completed run.
    ///
    /// # Errors
    ///
    /// [`CircuflowError::RunNotCompleted`] unless the run is `Completed`,
    /// [`CircuflowError::RunNotFound`] for unknown ids.
    pub fn get_result(&self, run_id: &str) -> Result<PipelineContext> {
        let entry = self.entry(run_id)?;
        let guard = entry.read();
        match (&guard.record.status, &guard.result) {
            (RunStatus::Completed, Some(result)) => Ok(result.clone()),
            (status, _) => Err(CircuflowError::RunNotCompleted {
                run_id: run_id.to_string(),
                status: *status,
            }),
        }
    }

    /// Returns every stage result recorded so far, in recording order.
    pub fn get_history(&self, run_id: &str) -> Result<Vec<StageResult>> {
        Ok(self.entry(run_id)?.read().history.clone())
    }

    /// Lists all runs, newest first.
    #[must_use]
    pub fn list_runs(&self) -> Vec<RunSummary> {
        let mut runs: Vec<RunSummary> = self
            .runs
            .iter()
            .map(|e| e.value().read().record.summary())
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs
    }

    /// Returns the number of registered runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if no runs are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Exclusive writer for one run's entry.
///
/// Every mutation returns `false` and leaves the entry untouched once the
/// run has reached a terminal status.
#[derive(Debug)]
pub struct RunHandle {
    run_id: String,
    entry: SharedEntry,
}

impl RunHandle {
    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Returns a snapshot of the record.
    #[must_use]
    pub fn snapshot(&self) -> RunRecord {
        self.entry.read().record.clone()
    }

    /// Returns the stage results recorded so far.
    #[must_use]
    pub fn history(&self) -> Vec<StageResult> {
        self.entry.read().history.clone()
    }

    fn mutate(&self, f: impl FnOnce(&mut RunEntry)) -> bool {
        let mut guard = self.entry.write();
        if guard.record.status.is_terminal() {
            return false;
        }
        f(&mut guard);
        true
    }

    /// Moves the run from `Pending` to `Running`.
    pub fn mark_running(&self) -> bool {
        self.mutate(|e| e.record.status = RunStatus::Running)
    }

    /// Sets the stage currently executing.
    pub fn enter_stage(&self, stage_id: &str) -> bool {
        self.mutate(|e| e.record.current_stage = Some(stage_id.to_string()))
    }

    /// Raises progress to `checkpoint`. Lower values are ignored.
    pub fn advance_progress(&self, checkpoint: u8) -> bool {
        self.mutate(|e| {
            e.record.progress = e.record.progress.max(checkpoint.min(100));
        })
    }

    /// Appends a log entry.
    pub fn append_log(&self, entry: RunLogEntry) -> bool {
        self.mutate(|e| e.record.logs.push(entry))
    }

    /// Records a stage result in the run's history.
    pub fn record_stage_result(&self, result: StageResult) -> bool {
        self.mutate(|e| e.history.push(result))
    }

    /// Marks the run completed and stores the final context.
    pub fn complete(&self, context: PipelineContext) -> bool {
        self.mutate(|e| {
            e.record.status = RunStatus::Completed;
            e.record.progress = 100;
            e.record.current_stage = None;
            e.record.completed_at = Some(Utc::now());
            e.result = Some(context);
        })
    }

    /// Marks the run failed. `current_stage` keeps pointing at the stage
    /// that failed.
    pub fn fail(&self, error: impl Into<String>) -> bool {
        let error = error.into();
        self.mutate(|e| {
            e.record.status = RunStatus::Failed;
            e.record.error = Some(error);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::assert_err;

    #[test]
    fn test_register_and_lifecycle() {
        let registry = RunRegistry::new();
        let handle = registry.register("r1").unwrap();

        assert_eq!(registry.get_status("r1").unwrap().status, RunStatus::Pending);
        assert!(handle.mark_running());
        assert!(handle.enter_stage("intake"));
        assert!(handle.advance_progress(10));

        let status = registry.get_status("r1").unwrap();
        assert_eq!(status.status, RunStatus::Running);
        assert_eq!(status.current_stage.as_deref(), Some("intake"));
        assert_eq!(status.progress, 10);

        let context: PipelineContext = [("material", json!("steel"))].into_iter().collect();
        assert!(handle.complete(context.clone()));

        let status = registry.get_status("r1").unwrap();
        assert_eq!(status.status, RunStatus::Completed);
        assert_eq!(status.progress, 100);
        assert!(status.current_stage.is_none());
        assert!(status.completed_at.is_some());
        assert_eq!(registry.get_result("r1").unwrap(), context);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = RunRegistry::new();
        let _handle = registry.register("r1").unwrap();

        let err = assert_err!(registry.register("r1"));
        assert!(matches!(err, CircuflowError::DuplicateRun { .. }));
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let registry = RunRegistry::new();
        let handle = registry.register("r1").unwrap();

        handle.advance_progress(50);
        handle.advance_progress(20);
        assert_eq!(handle.snapshot().progress, 50);

        handle.advance_progress(250);
        assert_eq!(handle.snapshot().progress, 100);
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let registry = RunRegistry::new();
        let handle = registry.register("r1").unwrap();
        handle.mark_running();
        assert!(handle.fail("Error in intake: boom"));

        assert!(!handle.mark_running());
        assert!(!handle.complete(PipelineContext::new()));
        assert!(!handle.append_log(RunLogEntry::new("x", LogLevel::Info, "late")));

        let status = registry.get_status("r1").unwrap();
        assert_eq!(status.status, RunStatus::Failed);
        assert_eq!(status.error.as_deref(), Some("Error in intake: boom"));
        assert!(status.logs.is_empty());
    }

    #[test]
    fn test_get_result_requires_completion() {
        let registry = RunRegistry::new();
        let handle = registry.register("r1").unwrap();
        handle.mark_running();

        let err = registry.get_result("r1").unwrap_err();
        assert_eq!(err.to_string(), "Run r1 not completed. Status: running");

        let err = registry.get_result("missing").unwrap_err();
        assert!(matches!(err, CircuflowError::RunNotFound { .. }));
    }

    #[test]
    fn test_history_and_listing() {
        let registry = RunRegistry::new();
        let first = registry.register("first").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let _second = registry.register("second").unwrap();

        first.record_stage_result(StageResult::success_value("validated", json!(true)));
        assert_eq!(registry.get_history("first").unwrap().len(), 1);

        let runs = registry.list_runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, "second");
        assert_eq!(runs[1].run_id, "first");
    }

    #[test]
    fn test_register_new_generates_unique_ids() {
        let registry = RunRegistry::new();
        let a = registry.register_new().unwrap();
        let b = registry.register_new().unwrap();
        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(registry.len(), 2);
    }
}
