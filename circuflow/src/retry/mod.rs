//! Retry with exponential backoff for transient stage failures.

mod classifier;
mod config;
mod executor;

pub use classifier::{ErrorClassifier, SignalClassifier, DEFAULT_TRANSIENT_SIGNALS};
pub use config::{JitterStrategy, RetryConfig, RetryState};
pub use executor::RetryExecutor;
