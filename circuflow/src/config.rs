//! Orchestrator configuration.

use crate::bridge::DEFAULT_MAX_BLOCKING_WORKERS;
use crate::errors::{CircuflowError, Result};
use crate::observability::LogFormat;
use crate::retry::{RetryConfig, SignalClassifier};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of characters of stage data kept in run log summaries.
pub const DEFAULT_LOG_SUMMARY_CHARS: usize = 500;

/// Settings shared by every run of an orchestrator.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```json
/// { "retry": { "max_attempts": 3 }, "transient_signals": ["503"] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Retry policy applied to stages that call rate-limited collaborators.
    pub retry: RetryConfig,
    /// Error substrings treated as transient in addition to the defaults.
    pub transient_signals: Vec<String>,
    /// Blocking stages allowed to run at once.
    pub max_blocking_workers: usize,
    /// Characters of stage data kept in each run log entry.
    pub log_summary_chars: usize,
    /// Directory for per-run JSON documents. `None` disables file output.
    pub store_dir: Option<PathBuf>,
    /// Log output format for [`crate::observability::init_tracing`].
    pub log_format: LogFormat,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            transient_signals: Vec::new(),
            max_blocking_workers: DEFAULT_MAX_BLOCKING_WORKERS,
            log_summary_chars: DEFAULT_LOG_SUMMARY_CHARS,
            store_dir: None,
            log_format: LogFormat::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CircuflowError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Checks every field.
    pub fn validate(&self) -> Result<()> {
        self.retry.validate().map_err(CircuflowError::Config)?;
        if self.max_blocking_workers == 0 {
            return Err(CircuflowError::config(
                "max_blocking_workers must be at least 1",
            ));
        }
        if self.log_summary_chars == 0 {
            return Err(CircuflowError::config("log_summary_chars must be at least 1"));
        }
        if self.transient_signals.iter().any(|s| s.trim().is_empty()) {
            return Err(CircuflowError::config(
                "transient_signals must not contain empty strings",
            ));
        }
        Ok(())
    }

    /// Builds the transient-error classifier: defaults plus configured signals.
    pub fn classifier(&self) -> Result<SignalClassifier> {
        SignalClassifier::with_extra_signals(self.transient_signals.iter().cloned())
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Adds a transient signal.
    #[must_use]
    pub fn with_transient_signal(mut self, signal: impl Into<String>) -> Self {
        self.transient_signals.push(signal.into());
        self
    }

    /// Sets the blocking worker pool size.
    #[must_use]
    pub fn with_max_blocking_workers(mut self, workers: usize) -> Self {
        self.max_blocking_workers = workers;
        self
    }

    /// Sets the log summary length.
    #[must_use]
    pub fn with_log_summary_chars(mut self, chars: usize) -> Self {
        self.log_summary_chars = chars;
        self
    }

    /// Enables per-run JSON documents under `dir`.
    #[must_use]
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = Some(dir.into());
        self
    }

    /// Sets the log format.
    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Installs the global tracing subscriber in [`log_format`](Self::log_format).
    ///
    /// Returns `false` if a subscriber was already installed.
    pub fn init_tracing(&self) -> bool {
        crate::observability::init_tracing(self.log_format)
    }
}
