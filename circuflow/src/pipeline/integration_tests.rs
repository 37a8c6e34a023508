//! Scenario tests for pipeline execution.

use crate::context::{InputScope, PipelineContext, StageContext};
use crate::core::{StageResult, StageStatus};
use crate::errors::{CircuflowError, StageError, StoreError};
use crate::events::{CollectingEventSink, PipelineEvent};
use crate::pipeline::{
    stage_ids, standard_pipeline, PipelineBuilder, PipelineOrchestrator, StageSpec,
};
use crate::registry::{LogLevel, RunLogEntry, RunRecord, RunStatus};
use crate::stages::{AsyncFnStage, StageRunner};
use crate::store::{JsonFileRunStore, MockRunStore, RunStore};
use crate::testing::{
    assert_progress_monotonic, assert_run_completed, assert_run_failed_with, fast_retry,
    noop_standard_stages, poll_until_terminal, standard_orchestrator, test_config,
    BlockingCalcStage, FailingStage, MockStage, PanickingStage, SlowStage, SuccessStage,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

fn steel_input() -> PipelineContext {
    PipelineContext::from_value(json!({"material": "steel"})).unwrap()
}

fn runner(stage: impl crate::stages::Stage + 'static) -> StageRunner {
    StageRunner::suspending(stage)
}

#[tokio::test]
async fn test_worked_example_completes() {
    let mut stages = noop_standard_stages();
    stages.intake = runner(
        SuccessStage::new(stage_ids::INTAKE)
            .with_value("material", json!("steel"))
            .with_value("validated", json!(true)),
    );
    stages.impact_calculation =
        runner(SuccessStage::new(stage_ids::IMPACT_CALCULATION).with_value("gwp", json!(1800)));
    stages.circularity_calculation = runner(
        SuccessStage::new(stage_ids::CIRCULARITY_CALCULATION).with_value("mci", json!(0.4)),
    );

    let orchestrator = standard_orchestrator(stages).unwrap();
    let outcome = orchestrator.run(steel_input()).await.unwrap();

    assert_run_completed(&outcome);
    let expected = PipelineContext::from_value(json!({
        "material": "steel",
        "validated": true,
        "gwp": 1800,
        "mci": 0.4
    }))
    .unwrap();
    assert_eq!(outcome.context, expected);

    let registry = orchestrator.registry();
    let record = registry.get_status(&outcome.run_id).unwrap();
    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.progress, 100);
    assert!(record.completed_at.is_some());
    assert!(record.current_stage.is_none());
    assert!(record.error.is_none());
    assert_eq!(registry.get_result(&outcome.run_id).unwrap(), expected);
    assert_eq!(registry.get_history(&outcome.run_id).unwrap().len(), 9);
}

#[tokio::test]
async fn test_required_failure_stops_run() {
    let later = Arc::new(MockStage::new(stage_ids::PARAMETER_ESTIMATION));
    let mut stages = noop_standard_stages();
    stages.intake = runner(FailingStage::new(stage_ids::INTAKE, "missing field: material"));
    stages.parameter_estimation = StageRunner::Suspending(later.clone());

    let orchestrator = standard_orchestrator(stages).unwrap();
    let outcome = orchestrator.run(PipelineContext::new()).await.unwrap();

    assert_run_failed_with(&outcome, "missing field: material");
    assert_eq!(later.call_count(), 0);

    let record = orchestrator.registry().get_status(&outcome.run_id).unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("missing field: material"));
    assert_eq!(record.current_stage.as_deref(), Some(stage_ids::INTAKE));
    assert!(record.completed_at.is_none());
    assert!(record
        .logs
        .iter()
        .any(|l| l.level == LogLevel::Error && l.stage == stage_ids::INTAKE));

    let err = orchestrator.registry().get_result(&outcome.run_id).unwrap_err();
    assert!(matches!(
        err,
        CircuflowError::RunNotCompleted { status: RunStatus::Failed, .. }
    ));
}

#[tokio::test]
async fn test_optional_failures_still_complete() {
    let mut stages = noop_standard_stages();
    stages.intake = runner(SuccessStage::new(stage_ids::INTAKE).with_value("validated", json!(true)));
    stages.parameter_estimation =
        runner(FailingStage::new(stage_ids::PARAMETER_ESTIMATION, "model unavailable"));
    stages.scenario_generation =
        runner(SuccessStage::new(stage_ids::SCENARIO_GENERATION).with_value("scenarios", json!([])));
    stages.compliance_check = runner(FailingStage::new(stage_ids::COMPLIANCE_CHECK, "no rules"));

    let orchestrator = standard_orchestrator(stages).unwrap();
    let outcome = orchestrator.run(steel_input()).await.unwrap();

    assert_run_completed(&outcome);
    for key in ["material", "validated", "scenarios"] {
        assert!(outcome.context.contains_key(key), "missing {key}");
    }

    let record = orchestrator.registry().get_status(&outcome.run_id).unwrap();
    let warnings: Vec<&str> = record
        .logs
        .iter()
        .filter(|l| l.level == LogLevel::Warning)
        .map(|l| l.stage.as_str())
        .collect();
    assert_eq!(
        warnings,
        vec![stage_ids::PARAMETER_ESTIMATION, stage_ids::COMPLIANCE_CHECK]
    );
}

#[tokio::test]
async fn test_fan_out_single_branch_failure() {
    let mut stages = noop_standard_stages();
    stages.impact_calculation = runner(FailingStage::new(stage_ids::IMPACT_CALCULATION, "no factors"));
    stages.circularity_calculation = runner(
        SuccessStage::new(stage_ids::CIRCULARITY_CALCULATION).with_value("mci", json!(0.4)),
    );

    let orchestrator = standard_orchestrator(stages).unwrap();
    let outcome = orchestrator.run(steel_input()).await.unwrap();

    assert_run_completed(&outcome);
    assert_eq!(outcome.context.get("mci"), Some(&json!(0.4)));
    assert!(!outcome.context.contains_key("gwp"));
}

#[tokio::test]
async fn test_fan_out_members_run_concurrently() {
    // Each member waits for the other; sequential execution would hang.
    let barrier = Arc::new(Barrier::new(2));
    let member = |id: &'static str, key: &'static str| {
        let barrier = Arc::clone(&barrier);
        runner(AsyncFnStage::new(id, move |_ctx: StageContext| {
            let barrier = Arc::clone(&barrier);
            async move {
                barrier.wait().await;
                Ok(StageResult::success_value(key, json!(true)))
            }
        }))
    };

    let mut stages = noop_standard_stages();
    stages.impact_calculation = member(stage_ids::IMPACT_CALCULATION, "gwp");
    stages.circularity_calculation = member(stage_ids::CIRCULARITY_CALCULATION, "mci");

    let orchestrator = standard_orchestrator(stages).unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), orchestrator.run(steel_input()))
        .await
        .expect("fan-out members did not run concurrently")
        .unwrap();

    assert_run_completed(&outcome);
    assert!(outcome.context.contains_key("gwp"));
    assert!(outcome.context.contains_key("mci"));
}

#[tokio::test]
async fn test_fan_out_members_see_same_snapshot() {
    let impact = Arc::new(
        MockStage::new(stage_ids::IMPACT_CALCULATION)
            .returning(Ok(StageResult::success_value("gwp", json!(1800)))),
    );
    let circularity = Arc::new(
        MockStage::new(stage_ids::CIRCULARITY_CALCULATION)
            .returning(Ok(StageResult::success_value("mci", json!(0.4)))),
    );
    let mut stages = noop_standard_stages();
    stages.impact_calculation = StageRunner::Suspending(impact.clone());
    stages.circularity_calculation = StageRunner::Suspending(circularity.clone());

    let orchestrator = standard_orchestrator(stages).unwrap();
    orchestrator.run(steel_input()).await.unwrap();

    let seen_by_impact = &impact.recorded_inputs()[0];
    let seen_by_circularity = &circularity.recorded_inputs()[0];
    assert_eq!(seen_by_impact, seen_by_circularity);
    assert!(!seen_by_circularity.contains_key("gwp"));
}

#[tokio::test]
async fn test_required_fan_out_failure_still_records_siblings() {
    let events = Arc::new(CollectingEventSink::new());
    let after = Arc::new(MockStage::new("after"));
    let pipeline = PipelineBuilder::new("fan")
        .fan_out(
            "group",
            vec![
                StageSpec::new("a", runner(FailingStage::new("a", "bad composition"))).required(),
                StageSpec::new(
                    "b",
                    runner(
                        SlowStage::new("b", Duration::from_millis(30)).with_value("bkey", json!(1)),
                    ),
                ),
            ],
        )
        .stage(StageSpec::new("after", StageRunner::Suspending(after.clone())))
        .build()
        .unwrap();
    let orchestrator = PipelineOrchestrator::new(pipeline, test_config())
        .unwrap()
        .with_event_sink(events.clone());

    let outcome = orchestrator.run(steel_input()).await.unwrap();

    assert_run_failed_with(&outcome, "bad composition");
    assert_eq!(outcome.context.get("bkey"), Some(&json!(1)));
    assert_eq!(after.call_count(), 0);

    let registry = orchestrator.registry();
    let history: Vec<String> = registry
        .get_history(&outcome.run_id)
        .unwrap()
        .into_iter()
        .map(|r| r.stage_id)
        .collect();
    assert_eq!(history, vec!["a".to_string(), "b".to_string()]);

    let b_levels: Vec<LogLevel> = registry
        .get_status(&outcome.run_id)
        .unwrap()
        .logs
        .iter()
        .filter(|entry| entry.stage == "b")
        .map(|entry| entry.level)
        .collect();
    assert_eq!(b_levels, vec![LogLevel::Info, LogLevel::Success]);
    assert_eq!(events.events_of_type("stage.started").len(), 2);
    assert_eq!(events.events_of_type("stage.finished").len(), 2);
}

/// Store that takes `delay` to persist the result entry of one stage.
#[derive(Debug)]
struct SlowResultStore {
    stage: &'static str,
    delay: Duration,
}

#[async_trait::async_trait]
impl RunStore for SlowResultStore {
    async fn create_run(&self, _record: &RunRecord) -> Result<(), StoreError> {
        Ok(())
    }

    async fn append_log(&self, _run_id: &str, entry: &RunLogEntry) -> Result<(), StoreError> {
        if entry.stage == self.stage && entry.level != LogLevel::Info {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }

    async fn set_final_result(
        &self,
        _record: &RunRecord,
        _result: Option<PipelineContext>,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_fan_out_member_not_held_by_sibling_persistence() {
    let pipeline = PipelineBuilder::new("fan")
        .fan_out(
            "group",
            vec![
                StageSpec::new("fast", runner(SlowStage::new("fast", Duration::from_millis(1)))),
                StageSpec::new("slow", runner(SlowStage::new("slow", Duration::from_millis(50)))),
            ],
        )
        .build()
        .unwrap();
    let store = SlowResultStore {
        stage: "fast",
        delay: Duration::from_millis(300),
    };
    let orchestrator = PipelineOrchestrator::new(pipeline, test_config())
        .unwrap()
        .with_store(Arc::new(store));

    let outcome = orchestrator.run(steel_input()).await.unwrap();
    assert_run_completed(&outcome);

    let history = orchestrator.registry().get_history(&outcome.run_id).unwrap();
    let slow = history.iter().find(|r| r.stage_id == "slow").unwrap();
    assert!(slow.execution_time_ms >= 50);
    assert!(
        slow.execution_time_ms < 250,
        "slow member took {}ms",
        slow.execution_time_ms
    );
}

#[tokio::test]
async fn test_merge_is_last_writer_wins() {
    let pipeline = PipelineBuilder::new("overwrite")
        .stage(StageSpec::from_runner(runner(
            SuccessStage::new("first").with_value("grade", json!("A")),
        )))
        .stage(StageSpec::from_runner(runner(
            SuccessStage::new("second").with_value("grade", json!("B")),
        )))
        .build()
        .unwrap();
    let orchestrator = PipelineOrchestrator::new(pipeline, test_config()).unwrap();

    let outcome = orchestrator
        .run_json(json!({"grade": "initial", "material": "steel"}))
        .await
        .unwrap();

    assert_eq!(outcome.context.get("grade"), Some(&json!("B")));
    assert_eq!(outcome.context.get("material"), Some(&json!("steel")));
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let estimation = Arc::new(
        MockStage::new(stage_ids::PARAMETER_ESTIMATION)
            .erroring_times(2, &StageError::external("429 Too Many Requests"))
            .returning(Ok(StageResult::success_value("density", json!(7.85)))),
    );
    let mut stages = noop_standard_stages();
    stages.parameter_estimation = StageRunner::Suspending(estimation.clone());

    let events = Arc::new(CollectingEventSink::new());
    let orchestrator = standard_orchestrator(stages)
        .unwrap()
        .with_event_sink(events.clone());
    let outcome = orchestrator.run(steel_input()).await.unwrap();

    assert_run_completed(&outcome);
    assert_eq!(estimation.call_count(), 3);
    assert_eq!(outcome.context.get("density"), Some(&json!(7.85)));

    let retries = events.events_of_type("stage.retry_scheduled");
    assert_eq!(retries.len(), 2);
    assert!(matches!(
        &retries[1],
        PipelineEvent::StageRetryScheduled { attempt: 2, delay_ms: 2, .. }
    ));
}

#[tokio::test]
async fn test_non_transient_error_becomes_failure_result() {
    let estimation = Arc::new(
        MockStage::new(stage_ids::PARAMETER_ESTIMATION)
            .returning(Err(StageError::unexpected("schema mismatch"))),
    );
    let mut stages = noop_standard_stages();
    stages.parameter_estimation = StageRunner::Suspending(estimation.clone());

    let orchestrator = standard_orchestrator(stages).unwrap();
    let outcome = orchestrator.run(steel_input()).await.unwrap();

    assert_run_completed(&outcome);
    assert_eq!(estimation.call_count(), 1);

    let history = orchestrator.registry().get_history(&outcome.run_id).unwrap();
    let failed = history
        .iter()
        .find(|r| r.stage_id == stage_ids::PARAMETER_ESTIMATION)
        .unwrap();
    assert_eq!(failed.status, StageStatus::Failure);
    assert_eq!(failed.log, "Error in parameter_estimation: schema mismatch");
    assert_eq!(failed.run_id, outcome.run_id);
}

#[tokio::test]
async fn test_required_stage_exhausting_retries_fails_run() {
    let intake = Arc::new(
        MockStage::new(stage_ids::INTAKE)
            .returning(Err(StageError::external("RESOURCE_EXHAUSTED: quota"))),
    );
    let mut stages = noop_standard_stages();
    stages.intake = StageRunner::Suspending(intake.clone());

    let orchestrator = standard_orchestrator(stages).unwrap();
    let outcome = orchestrator.run(steel_input()).await.unwrap();

    assert_run_failed_with(&outcome, "Error in intake: RESOURCE_EXHAUSTED: quota");
    assert_eq!(intake.call_count(), 3);
}

#[tokio::test]
async fn test_panicking_optional_stage_is_contained() {
    let mut stages = noop_standard_stages();
    stages.visualization = runner(PanickingStage::new(stage_ids::VISUALIZATION, "chart overflow"));

    let orchestrator = standard_orchestrator(stages).unwrap();
    let outcome = orchestrator.run(steel_input()).await.unwrap();

    assert_run_completed(&outcome);
    let history = orchestrator.registry().get_history(&outcome.run_id).unwrap();
    let failed = history
        .iter()
        .find(|r| r.stage_id == stage_ids::VISUALIZATION)
        .unwrap();
    assert_eq!(
        failed.log,
        "Error in visualization: stage panicked: chart overflow"
    );
}

#[tokio::test]
async fn test_blocking_stage_in_pipeline() {
    let mut stages = noop_standard_stages();
    stages.impact_calculation = StageRunner::blocking(
        BlockingCalcStage::new(stage_ids::IMPACT_CALCULATION, Duration::from_millis(5))
            .with_value("gwp", json!(1800)),
    );

    let orchestrator = standard_orchestrator(stages).unwrap();
    let outcome = orchestrator.run(steel_input()).await.unwrap();

    assert_run_completed(&outcome);
    assert_eq!(outcome.context.get("gwp"), Some(&json!(1800)));
    let history = orchestrator.registry().get_history(&outcome.run_id).unwrap();
    let impact = history
        .iter()
        .find(|r| r.stage_id == stage_ids::IMPACT_CALCULATION)
        .unwrap();
    assert!(impact.execution_time_ms >= 5);
}

#[tokio::test]
async fn test_quality_critique_sees_history() {
    let critique = Arc::new(MockStage::new(stage_ids::QUALITY_CRITIQUE));
    let mut stages = noop_standard_stages();
    stages.intake = runner(SuccessStage::new(stage_ids::INTAKE).with_value("validated", json!(true)));
    stages.quality_critique = StageRunner::Suspending(critique.clone());

    let orchestrator = standard_orchestrator(stages).unwrap();
    orchestrator.run(steel_input()).await.unwrap();

    assert_eq!(
        orchestrator
            .pipeline()
            .stage(stage_ids::QUALITY_CRITIQUE)
            .unwrap()
            .input,
        InputScope::History
    );

    let input = &critique.recorded_inputs()[0];
    assert_eq!(
        input.get("current_context"),
        Some(&json!({"material": "steel", "validated": true}))
    );
    let history = input.get("history").and_then(|h| h.as_object()).unwrap();
    assert_eq!(history.len(), 8);
    assert_eq!(history[stage_ids::INTAKE]["data"], json!({"validated": true}));
    assert_eq!(history[stage_ids::INTAKE]["status"], json!("success"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_submit_and_poll_progress() {
    let slow = |id: &str| runner(SlowStage::new(id, Duration::from_millis(5)));
    let mut stages = noop_standard_stages();
    stages.intake = slow(stage_ids::INTAKE);
    stages.parameter_estimation = slow(stage_ids::PARAMETER_ESTIMATION);
    stages.scenario_generation = slow(stage_ids::SCENARIO_GENERATION);
    stages.narrative_explanation = slow(stage_ids::NARRATIVE_EXPLANATION);

    let orchestrator = standard_orchestrator(stages).unwrap();
    let run_id = orchestrator.submit(steel_input()).unwrap();

    let snapshots = poll_until_terminal(orchestrator.registry(), &run_id, Duration::from_secs(5))
        .await
        .expect("run did not finish");

    assert_progress_monotonic(&snapshots);
    let last = snapshots.last().unwrap();
    assert_eq!(last.status, RunStatus::Completed);
    assert_eq!(last.progress, 100);
    assert!(snapshots.iter().any(|s| s.status == RunStatus::Running));
    assert_eq!(orchestrator.registry().list_runs()[0].run_id, run_id);
}

#[tokio::test]
async fn test_events_bracket_the_run() {
    let events = Arc::new(CollectingEventSink::new());
    let orchestrator = standard_orchestrator(noop_standard_stages())
        .unwrap()
        .with_event_sink(events.clone());
    orchestrator.run(steel_input()).await.unwrap();

    let types = events.event_types();
    assert_eq!(types.first(), Some(&"run.started"));
    assert_eq!(types.last(), Some(&"run.finished"));
    assert_eq!(events.events_of_type("stage.started").len(), 9);
    assert_eq!(events.events_of_type("stage.finished").len(), 9);
}

#[tokio::test]
async fn test_run_logs_carry_audit_hashes() {
    let orchestrator = standard_orchestrator(noop_standard_stages()).unwrap();
    let outcome = orchestrator.run(steel_input()).await.unwrap();

    let record = orchestrator.registry().get_status(&outcome.run_id).unwrap();
    let intake_success = record
        .logs
        .iter()
        .find(|l| l.stage == stage_ids::INTAKE && l.level == LogLevel::Success)
        .unwrap();
    let data = intake_success.data.as_ref().unwrap();

    assert_eq!(data["status"], json!("success"));
    assert_eq!(
        data["input_hash"],
        json!(crate::utils::content_hash(&json!({"material": "steel"})))
    );
    assert_eq!(data["output_hash"].as_str().map(str::len), Some(64));
}

#[tokio::test]
async fn test_store_receives_every_record_change() {
    let mut store = MockRunStore::new();
    store.expect_create_run().times(1).returning(|_| Ok(()));
    // Pipeline start, nine stage starts, nine stage results, pipeline end.
    store.expect_append_log().times(20).returning(|_, _| Ok(()));
    store
        .expect_set_final_result()
        .withf(|record, result| record.status == RunStatus::Completed && result.is_some())
        .times(1)
        .returning(|_, _| Ok(()));

    let orchestrator = standard_orchestrator(noop_standard_stages())
        .unwrap()
        .with_store(Arc::new(store));
    let outcome = orchestrator.run(steel_input()).await.unwrap();

    assert_run_completed(&outcome);
}

#[tokio::test]
async fn test_store_failures_do_not_change_outcome() {
    let mut store = MockRunStore::new();
    store
        .expect_create_run()
        .returning(|_| Err(StoreError::Backend("db down".into())));
    store
        .expect_append_log()
        .returning(|_, _| Err(StoreError::Backend("db down".into())));
    store
        .expect_set_final_result()
        .returning(|_, _| Err(StoreError::Backend("db down".into())));

    let orchestrator = standard_orchestrator(noop_standard_stages())
        .unwrap()
        .with_store(Arc::new(store));
    let outcome = orchestrator.run(steel_input()).await.unwrap();

    assert_run_completed(&outcome);
    assert_eq!(
        orchestrator.registry().get_status(&outcome.run_id).unwrap().logs.len(),
        20
    );
}

#[tokio::test]
async fn test_file_store_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config().with_store_dir(dir.path());
    let pipeline = standard_pipeline(noop_standard_stages(), Some(fast_retry(2))).unwrap();
    let orchestrator = PipelineOrchestrator::new(pipeline, config).unwrap();

    let outcome = orchestrator.run(steel_input()).await.unwrap();

    let reader = JsonFileRunStore::new(dir.path());
    let stored = reader.load(&outcome.run_id).await.unwrap();
    assert_eq!(stored.record.status, RunStatus::Completed);
    assert_eq!(stored.record.logs.len(), 20);
    assert_eq!(stored.result, Some(outcome.context));

    // The reader can keep appending to the same document.
    assert!(reader
        .append_log(
            &outcome.run_id,
            &RunLogEntry::new("audit", LogLevel::Info, "reviewed"),
        )
        .await
        .is_ok());
}

#[tokio::test]
async fn test_shared_registry_between_orchestrators() {
    let registry = crate::registry::RunRegistry::new();
    let first = standard_orchestrator(noop_standard_stages())
        .unwrap()
        .with_registry(registry.clone());
    let second = standard_orchestrator(noop_standard_stages())
        .unwrap()
        .with_registry(registry.clone());

    let a = first.run(steel_input()).await.unwrap();
    let b = second.run(steel_input()).await.unwrap();

    assert_ne!(a.run_id, b.run_id);
    assert_eq!(registry.len(), 2);
}
