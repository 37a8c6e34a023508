//! Error types for the circuflow orchestration engine.
//!
//! Three families live here:
//!
//! - [`CircuflowError`]: top-level failures of the engine itself (invalid
//!   pipeline declarations, unknown runs, configuration problems).
//! - [`StageError`]: problems that escape a stage implementation. The
//!   orchestrator never propagates these; it converts them into a synthetic
//!   failure result and applies the stage's policy.
//! - [`StoreError`]: failures of the persistence collaborator. These are
//!   logged and absorbed.

use crate::registry::RunStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = CircuflowError> = std::result::Result<T, E>;

/// The main error type for circuflow operations.
#[derive(Debug, Error)]
pub enum CircuflowError {
    /// A pipeline declaration failed validation.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// No run is registered under the given id.
    #[error("Run not found: {run_id}")]
    RunNotFound {
        /// The requested run id.
        run_id: String,
    },

    /// The run exists but has not reached `Completed`.
    #[error("Run {run_id} not completed. Status: {status}")]
    RunNotCompleted {
        /// The requested run id.
        run_id: String,
        /// The status observed at read time.
        status: RunStatus,
    },

    /// A run id was registered twice.
    #[error("Run already registered: {run_id}")]
    DuplicateRun {
        /// The conflicting run id.
        run_id: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The persistence collaborator failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CircuflowError {
    /// Creates a run-not-found error.
    #[must_use]
    pub fn run_not_found(run_id: impl Into<String>) -> Self {
        Self::RunNotFound {
            run_id: run_id.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Errors escaping a stage implementation.
///
/// The retry executor classifies these by their rendered message, so the
/// text of [`StageError::External`] should carry whatever the upstream
/// collaborator reported (status codes, quota markers).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// An external collaborator (model endpoint, service) returned an error.
    #[error("{0}")]
    External(String),

    /// Anything else the stage did not anticipate.
    #[error("{0}")]
    Unexpected(String),

    /// The stage panicked.
    #[error("stage panicked: {0}")]
    Panicked(String),

    /// The blocking worker pool could not run the stage.
    #[error("worker pool unavailable: {0}")]
    WorkerPool(String),
}

impl StageError {
    /// Creates an external collaborator error.
    #[must_use]
    pub fn external(message: impl Into<String>) -> Self {
        Self::External(message.into())
    }

    /// Creates an unexpected error.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

/// Errors raised by a [`crate::store::RunStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or could not complete the operation.
    #[error("Store backend error: {0}")]
    Backend(String),

    /// The document could not be encoded.
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata about a validation error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PIPELINE-DUPLICATE-STAGE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline declaration fails validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Error for a stage id declared more than once.
    #[must_use]
    pub fn duplicate_stage(stage_id: &str) -> Self {
        Self::new(format!("Stage '{stage_id}' is declared more than once"))
            .with_stages(vec![stage_id.to_string()])
            .with_error_info(
                ContractErrorInfo::new(
                    "PIPELINE-DUPLICATE-STAGE",
                    format!("Duplicate stage id: {stage_id}"),
                )
                .with_fix_hint("Give every stage and fan-out member a unique id."),
            )
    }

    /// Error for a pipeline with no stages.
    #[must_use]
    pub fn empty(pipeline: &str) -> Self {
        Self::new(format!("Pipeline '{pipeline}' declares no stages")).with_error_info(
            ContractErrorInfo::new("PIPELINE-EMPTY", "Pipeline has no stages")
                .with_fix_hint("Add at least one stage to the pipeline before building."),
        )
    }
}
