//! Run status records as seen by pollers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Registered, not yet started.
    Pending,
    /// Stages are executing.
    Running,
    /// Every stage ran and the final context is available.
    Completed,
    /// A required stage failed.
    Failed,
}

impl RunStatus {
    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Informational.
    Info,
    /// A stage succeeded.
    Success,
    /// An optional stage failed.
    Warning,
    /// A required stage failed.
    Error,
}

/// One entry in a run's human-readable log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
    /// Stage the entry concerns.
    pub stage: String,
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RunLogEntry {
    /// Creates an entry stamped now.
    #[must_use]
    pub fn new(stage: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stage: stage.into(),
            level,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches a structured payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Externally observable state of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run id.
    pub run_id: String,
    /// Lifecycle state.
    pub status: RunStatus,
    /// Progress percentage, 0 to 100. Never decreases.
    pub progress: u8,
    /// Stage currently executing, if any.
    pub current_stage: Option<String>,
    /// Ordered log entries.
    pub logs: Vec<RunLogEntry>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Completion time; set only on `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure message; set only on `Failed`.
    pub error: Option<String>,
}

impl RunRecord {
    /// Creates a fresh pending record.
    #[must_use]
    pub fn pending(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::Pending,
            progress: 0,
            current_stage: None,
            logs: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Returns the summary form used in run listings.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            status: self.status,
            progress: self.progress,
            created_at: self.created_at,
        }
    }
}

/// Short form of a run for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run id.
    pub run_id: String,
    /// Lifecycle state.
    pub status: RunStatus,
    /// Progress percentage.
    pub progress: u8,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}
