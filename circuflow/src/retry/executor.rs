//! Classification-gated exponential backoff.

use super::{ErrorClassifier, RetryConfig, RetryState, SignalClassifier};
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Wraps a single operation with retry on transient failures.
///
/// Only errors the classifier marks transient are retried. Anything else is
/// returned on the spot, without sleeping.
#[derive(Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    classifier: Arc<dyn ErrorClassifier>,
}

impl RetryExecutor {
    /// Creates an executor with an explicit classifier.
    #[must_use]
    pub fn new(config: RetryConfig, classifier: Arc<dyn ErrorClassifier>) -> Self {
        Self { config, classifier }
    }

    /// Creates an executor using the default signal classifier.
    #[must_use]
    pub fn with_default_classifier(config: RetryConfig) -> Self {
        Self::new(config, Arc::new(SignalClassifier::default()))
    }

    /// Returns the retry configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` until it succeeds, fails non-transiently, or
    /// exhausts `max_attempts`. The last error is returned on exhaustion.
    pub async fn run_with_retry<T, E, F, Fut>(&self, key: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_with_retry_notify(key, operation, |_, _, _| {}).await
    }

    /// Like [`run_with_retry`](Self::run_with_retry), calling `on_retry`
    /// with `(attempt, delay, error)` before every backoff sleep.
    pub async fn run_with_retry_notify<T, E, F, Fut, N>(
        &self,
        key: &str,
        mut operation: F,
        mut on_retry: N,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        N: FnMut(usize, Duration, &E),
    {
        let mut state = RetryState::new(&self.config);

        loop {
            state.attempt += 1;
            let err = match operation().await {
                Ok(value) => {
                    if state.attempt > 1 {
                        tracing::debug!(key, attempts = state.attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let message = err.to_string();
            if !self.classifier.is_transient(&message) {
                tracing::debug!(key, attempt = state.attempt, error = %message, "Non-transient error, not retrying");
                return Err(err);
            }

            if state.is_exhausted(&self.config) {
                tracing::error!(
                    key,
                    max_attempts = self.config.max_attempts,
                    error = %message,
                    "Max retries reached"
                );
                return Err(err);
            }

            let delay = state.next_delay(&self.config);
            tracing::warn!(
                key,
                attempt = state.attempt,
                max_attempts = self.config.max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %message,
                "Transient error, retrying"
            );
            on_retry(state.attempt, delay, &err);
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::with_default_classifier(RetryConfig::default())
    }
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
