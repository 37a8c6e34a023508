//! Transient-error classification.
//!
//! Collaborators surface rate limiting and quota exhaustion only as text in
//! their error messages, so classification is substring matching over the
//! rendered error. The default signal set is known to be incomplete; extra
//! signals can be added through configuration.

use crate::errors::{CircuflowError, Result};
use regex::RegexSet;
use std::fmt;

/// Signals treated as transient when no configuration says otherwise.
pub const DEFAULT_TRANSIENT_SIGNALS: &[&str] = &["429", "RESOURCE_EXHAUSTED"];

/// Decides whether an error message describes a retryable condition.
pub trait ErrorClassifier: Send + Sync {
    /// Returns true if the error should be retried.
    fn is_transient(&self, message: &str) -> bool;
}

impl<F> ErrorClassifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_transient(&self, message: &str) -> bool {
        self(message)
    }
}

/// Classifier matching a fixed set of literal substrings.
#[derive(Clone)]
pub struct SignalClassifier {
    signals: Vec<String>,
    matcher: RegexSet,
}

impl SignalClassifier {
    /// Builds a classifier for the given literal signals.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the signal set is too large to
    /// compile.
    pub fn new<I, S>(signals: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let signals: Vec<String> = signals
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.is_empty())
            .collect();
        let matcher = RegexSet::new(signals.iter().map(|s| regex::escape(s)))
            .map_err(|e| CircuflowError::config(format!("invalid transient signals: {e}")))?;
        Ok(Self { signals, matcher })
    }

    /// Builds a classifier for the default signals plus `extra`.
    ///
    /// # Errors
    ///
    /// See [`SignalClassifier::new`].
    pub fn with_extra_signals<I, S>(extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut signals: Vec<String> = DEFAULT_TRANSIENT_SIGNALS
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        for signal in extra {
            let signal = signal.into();
            if !signals.contains(&signal) {
                signals.push(signal);
            }
        }
        Self::new(signals)
    }

    /// Returns the configured signals.
    #[must_use]
    pub fn signals(&self) -> &[String] {
        &self.signals
    }
}

impl Default for SignalClassifier {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new(DEFAULT_TRANSIENT_SIGNALS.iter().copied())
            .expect("default transient signals are short literals")
    }
}

impl fmt::Debug for SignalClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalClassifier")
            .field("signals", &self.signals)
            .finish()
    }
}

impl ErrorClassifier for SignalClassifier {
    fn is_transient(&self, message: &str) -> bool {
        self.matcher.is_match(message)
    }
}
