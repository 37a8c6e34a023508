//! Typed lifecycle events emitted by the orchestrator.

use crate::core::StageStatus;
use crate::registry::RunStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An orchestration lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A run moved to `Running`.
    RunStarted {
        /// Run id.
        run_id: String,
        /// Pipeline name.
        pipeline: String,
        /// Event time.
        timestamp: DateTime<Utc>,
    },
    /// A stage is about to be invoked.
    StageStarted {
        /// Run id.
        run_id: String,
        /// Stage id.
        stage_id: String,
        /// Event time.
        timestamp: DateTime<Utc>,
    },
    /// A stage produced its (possibly synthetic) result.
    StageFinished {
        /// Run id.
        run_id: String,
        /// Stage id.
        stage_id: String,
        /// Outcome.
        status: StageStatus,
        /// Wall time including retries.
        execution_time_ms: u64,
        /// Event time.
        timestamp: DateTime<Utc>,
    },
    /// A transient stage error will be retried.
    StageRetryScheduled {
        /// Run id.
        run_id: String,
        /// Stage id.
        stage_id: String,
        /// Attempt that just failed, starting at 1.
        attempt: usize,
        /// Backoff before the next attempt.
        delay_ms: u64,
        /// Rendered error.
        error: String,
        /// Event time.
        timestamp: DateTime<Utc>,
    },
    /// A run reached a terminal status.
    RunFinished {
        /// Run id.
        run_id: String,
        /// Terminal status.
        status: RunStatus,
        /// Failure message, if any.
        error: Option<String>,
        /// Event time.
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Dotted event name, e.g. `stage.finished`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run.started",
            Self::StageStarted { .. } => "stage.started",
            Self::StageFinished { .. } => "stage.finished",
            Self::StageRetryScheduled { .. } => "stage.retry_scheduled",
            Self::RunFinished { .. } => "run.finished",
        }
    }

    /// Run the event belongs to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::StageStarted { run_id, .. }
            | Self::StageFinished { run_id, .. }
            | Self::StageRetryScheduled { run_id, .. }
            | Self::RunFinished { run_id, .. } => run_id,
        }
    }

    /// Stage the event concerns, for stage-level events.
    #[must_use]
    pub fn stage_id(&self) -> Option<&str> {
        match self {
            Self::StageStarted { stage_id, .. }
            | Self::StageFinished { stage_id, .. }
            | Self::StageRetryScheduled { stage_id, .. } => Some(stage_id),
            Self::RunStarted { .. } | Self::RunFinished { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_accessors() {
        let event = PipelineEvent::StageStarted {
            run_id: "r1".into(),
            stage_id: "intake".into(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type(), "stage.started");
        assert_eq!(event.run_id(), "r1");
        assert_eq!(event.stage_id(), Some("intake"));
    }

    #[test]
    fn test_event_is_tagged() {
        let event = PipelineEvent::RunFinished {
            run_id: "r1".into(),
            status: RunStatus::Failed,
            error: Some("Error in intake: boom".into()),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("run_finished"));
        assert_eq!(value["status"], json!("failed"));
    }
}
