//! Test fixtures for pipeline testing.

use std::time::Duration;

use crate::config::OrchestratorConfig;
use crate::errors::Result;
use crate::pipeline::{stage_ids, PipelineOrchestrator, StandardStages};
use crate::registry::{RunRecord, RunRegistry};
use crate::retry::RetryConfig;
use crate::stages::{NoOpStage, StageRunner};

/// A retry policy with millisecond delays.
#[must_use]
pub fn fast_retry(max_attempts: usize) -> RetryConfig {
    RetryConfig::new()
        .with_max_attempts(max_attempts)
        .with_initial_delay(Duration::from_millis(1))
}

/// An orchestrator configuration suitable for tests: fast retries and a
/// small worker pool.
#[must_use]
pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig::new()
        .with_retry(fast_retry(3))
        .with_max_blocking_workers(2)
}

/// Standard stages that all succeed without data.
#[must_use]
pub fn noop_standard_stages() -> StandardStages {
    let noop = |id: &str| StageRunner::suspending(NoOpStage::new(id));
    StandardStages {
        intake: noop(stage_ids::INTAKE),
        parameter_estimation: noop(stage_ids::PARAMETER_ESTIMATION),
        impact_calculation: noop(stage_ids::IMPACT_CALCULATION),
        circularity_calculation: noop(stage_ids::CIRCULARITY_CALCULATION),
        scenario_generation: noop(stage_ids::SCENARIO_GENERATION),
        visualization: noop(stage_ids::VISUALIZATION),
        narrative_explanation: noop(stage_ids::NARRATIVE_EXPLANATION),
        compliance_check: noop(stage_ids::COMPLIANCE_CHECK),
        quality_critique: noop(stage_ids::QUALITY_CRITIQUE),
    }
}

/// Builds an orchestrator over the standard pipeline with `stages`.
pub fn standard_orchestrator(stages: StandardStages) -> Result<PipelineOrchestrator> {
    let config = test_config();
    let pipeline = crate::pipeline::standard_pipeline(stages, Some(config.retry.clone()))?;
    PipelineOrchestrator::new(pipeline, config)
}

/// Polls `registry` until the run is terminal, collecting every snapshot.
///
/// Returns `None` if the run is unknown or does not finish within `timeout`.
pub async fn poll_until_terminal(
    registry: &RunRegistry,
    run_id: &str,
    timeout: Duration,
) -> Option<Vec<RunRecord>> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut snapshots = Vec::new();
    loop {
        let record = registry.get_status(run_id).ok()?;
        let done = record.status.is_terminal();
        snapshots.push(record);
        if done {
            return Some(snapshots);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
