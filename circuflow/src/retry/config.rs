//! Retry configuration and per-call retry state.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Jitter applied on top of the exponential delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// Sleep exactly the computed delay.
    #[default]
    None,
    /// Random from 0 to delay.
    Full,
    /// Half fixed, half random.
    Equal,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts, including the first one.
    pub max_attempts: usize,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Factor applied to the delay after every retry.
    pub backoff_multiplier: f64,
    /// Optional cap on a single delay, in milliseconds.
    pub max_delay_ms: Option<u64>,
    /// Jitter strategy.
    pub jitter: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            max_delay_ms: None,
            jitter: JitterStrategy::None,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Caps every delay at `delay`.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the initial delay.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Checks the configuration for values the executor cannot honour.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".into());
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(format!(
                "retry.backoff_multiplier must be a finite number >= 1, got {}",
                self.backoff_multiplier
            ));
        }
        Ok(())
    }
}

/// State of one retrying call. Created per call and dropped on return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempt: usize,
    /// Delay to sleep before the next attempt (before jitter).
    pub delay: Duration,
}

impl RetryState {
    /// Creates the state for a fresh call.
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        let delay = config.initial_delay();
        Self {
            attempt: 0,
            delay: config
                .max_delay_ms
                .map_or(delay, |cap| delay.min(Duration::from_millis(cap))),
        }
    }

    /// Returns true once `attempt` has reached the configured maximum.
    #[must_use]
    pub fn is_exhausted(&self, config: &RetryConfig) -> bool {
        self.attempt >= config.max_attempts.max(1)
    }

    /// Returns the delay to sleep now and advances the backoff.
    pub fn next_delay(&mut self, config: &RetryConfig) -> Duration {
        let current = self.delay;

        let mut next = Duration::from_millis(scale_millis(current, config.backoff_multiplier));
        if let Some(cap) = config.max_delay_ms {
            next = next.min(Duration::from_millis(cap));
        }
        self.delay = next;

        apply_jitter(current, config.jitter)
    }
}

// Float-to-int `as` saturates on overflow.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn scale_millis(delay: Duration, multiplier: f64) -> u64 {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    (millis as f64 * multiplier).round() as u64
}

fn apply_jitter(delay: Duration, jitter: JitterStrategy) -> Duration {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    let jittered = match jitter {
        JitterStrategy::None => return delay,
        JitterStrategy::Full => {
            if millis == 0 {
                0
            } else {
                rand::thread_rng().gen_range(0..=millis)
            }
        }
        JitterStrategy::Equal => {
            let half = millis / 2;
            if half == 0 {
                millis
            } else {
                half + rand::thread_rng().gen_range(0..=half)
            }
        }
    };
    Duration::from_millis(jittered)
}
