//! Testing utilities for circuflow pipelines.
//!
//! This module provides:
//! - Mock stages (scripted, slow, blocking, panicking)
//! - Assertions for stage results and runs
//! - Fixtures for the standard pipeline and run polling

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_progress_monotonic, assert_result_failed, assert_result_status,
    assert_result_succeeded, assert_result_value, assert_run_completed, assert_run_failed_with,
};
pub use fixtures::{
    fast_retry, noop_standard_stages, poll_until_terminal, standard_orchestrator, test_config,
};
pub use mocks::{
    BlockingCalcStage, FailingStage, MockStage, PanickingStage, SlowStage, SuccessStage,
};
