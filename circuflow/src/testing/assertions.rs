//! Test assertions for stage results and runs.

use crate::core::{StageResult, StageStatus};
use crate::pipeline::RunOutcome;
use crate::registry::{RunRecord, RunStatus};

/// Asserts that the result indicates success or partial success.
pub fn assert_result_succeeded(result: &StageResult) {
    assert!(
        result.is_success(),
        "Expected success, got status: {:?} ({})",
        result.status,
        result.log
    );
}

/// Asserts that the result indicates failure.
pub fn assert_result_failed(result: &StageResult) {
    assert!(
        result.is_failure(),
        "Expected failure, got status: {:?}",
        result.status
    );
}

/// Asserts that the result has the expected status.
pub fn assert_result_status(result: &StageResult, expected: StageStatus) {
    assert_eq!(
        result.status, expected,
        "Expected status {:?}, got {:?}",
        expected, result.status
    );
}

/// Asserts that the result data holds `expected` under `key`.
pub fn assert_result_value(result: &StageResult, key: &str, expected: &serde_json::Value) {
    let actual = result.get(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected value {expected:?} for key '{key}', got {actual:?}"
    );
}

/// Asserts that a run completed.
pub fn assert_run_completed(outcome: &RunOutcome) {
    assert_eq!(
        outcome.status,
        RunStatus::Completed,
        "Expected run {} to complete, it failed with: {:?}",
        outcome.run_id,
        outcome.error
    );
}

/// Asserts that a run failed with an error containing `fragment`.
pub fn assert_run_failed_with(outcome: &RunOutcome, fragment: &str) {
    assert_eq!(outcome.status, RunStatus::Failed, "Expected run {} to fail", outcome.run_id);
    let error = outcome.error.as_deref().unwrap_or_default();
    assert!(
        error.contains(fragment),
        "Expected error containing '{fragment}', got '{error}'"
    );
}

/// Asserts that a sequence of polled records never shows progress going down.
pub fn assert_progress_monotonic(records: &[RunRecord]) {
    for pair in records.windows(2) {
        assert!(
            pair[0].progress <= pair[1].progress,
            "Progress went from {} to {}",
            pair[0].progress,
            pair[1].progress
        );
    }
}
