//! Run execution.
//!
//! A run walks the pipeline steps in order against one accumulating
//! [`PipelineContext`]. Each stage result is recorded in the run history and
//! logged; successful data is merged into the context; a failed required
//! stage ends the run. Fan-out members share one context snapshot, run on
//! their own tasks and are merged in completion order.

use super::{PipelineDefinition, PipelineStep, StageSpec};
use crate::bridge::ExecutionBridge;
use crate::config::OrchestratorConfig;
use crate::context::{InputScope, PipelineContext, StageContext};
use crate::core::StageResult;
use crate::errors::{Result, StageError};
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::observability::StageTimer;
use crate::registry::{LogLevel, RunHandle, RunLogEntry, RunRecord, RunRegistry, RunStatus};
use crate::retry::{ErrorClassifier, RetryExecutor};
use crate::store::{JsonFileRunStore, NoOpRunStore, RunStore};
use crate::utils::content_hash;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

/// Log stage name used for run-level entries.
const ORCHESTRATOR_LOG_STAGE: &str = "orchestrator";

/// Final state of a run as returned by [`PipelineOrchestrator::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Run id.
    pub run_id: String,
    /// Terminal status.
    pub status: RunStatus,
    /// Context at the end of the run. For failed runs, the context as it
    /// was when the required stage failed.
    pub context: PipelineContext,
    /// Failure message for failed runs.
    pub error: Option<String>,
}

impl RunOutcome {
    /// Returns true if the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Executes runs of one pipeline definition.
///
/// Cloning is cheap and shares the registry, worker pool, store and sink.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    pipeline: Arc<PipelineDefinition>,
    registry: RunRegistry,
    bridge: ExecutionBridge,
    store: Arc<dyn RunStore>,
    events: Arc<dyn EventSink>,
    classifier: Arc<dyn ErrorClassifier>,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("pipeline", &self.pipeline.name())
            .field("runs", &self.registry.len())
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}

impl PipelineOrchestrator {
    /// Creates an orchestrator from a validated configuration.
    ///
    /// Runs are persisted to `config.store_dir` when it is set.
    pub fn new(pipeline: PipelineDefinition, config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let classifier = config.classifier()?;
        let store: Arc<dyn RunStore> = match &config.store_dir {
            Some(dir) => Arc::new(JsonFileRunStore::new(dir.clone())),
            None => Arc::new(NoOpRunStore),
        };

        Ok(Self {
            pipeline: Arc::new(pipeline),
            registry: RunRegistry::new(),
            bridge: ExecutionBridge::new(config.max_blocking_workers),
            store,
            events: Arc::new(NoOpEventSink),
            classifier: Arc::new(classifier),
            config,
        })
    }

    /// Shares an existing registry, e.g. one also served to pollers.
    #[must_use]
    pub fn with_registry(mut self, registry: RunRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Shares an existing worker pool.
    #[must_use]
    pub fn with_bridge(mut self, bridge: ExecutionBridge) -> Self {
        self.bridge = bridge;
        self
    }

    /// Replaces the persistence collaborator.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Replaces the transient-error classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Returns the pipeline definition.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineDefinition {
        &self.pipeline
    }

    /// Returns the run registry.
    #[must_use]
    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs the pipeline to completion on the current task.
    pub async fn run(&self, input: PipelineContext) -> Result<RunOutcome> {
        let handle = self.registry.register_new()?;
        self.persist_created(&handle).await;
        Ok(self.execute(handle, input).await)
    }

    /// Like [`run`](Self::run), taking raw JSON input.
    ///
    /// # Errors
    ///
    /// Fails without registering a run if `input` is not a JSON object.
    pub async fn run_json(&self, input: Value) -> Result<RunOutcome> {
        self.run(PipelineContext::from_value(input)?).await
    }

    /// Registers a pending run and executes it in the background.
    ///
    /// Returns the run id immediately; progress is read from the registry.
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, input: PipelineContext) -> Result<String> {
        let handle = self.registry.register_new()?;
        let run_id = handle.run_id().to_string();
        let this = self.clone();
        tokio::spawn(async move {
            this.persist_created(&handle).await;
            this.execute(handle, input).await
        });
        Ok(run_id)
    }

    async fn execute(&self, handle: RunHandle, input: PipelineContext) -> RunOutcome {
        let run_id = handle.run_id().to_string();
        let pipeline = self.pipeline.name();

        handle.mark_running();
        info!(run_id = %run_id, pipeline, stages = self.pipeline.stage_count(), "Run started");
        self.events
            .emit(PipelineEvent::RunStarted {
                run_id: run_id.clone(),
                pipeline: pipeline.to_string(),
                timestamp: Utc::now(),
            })
            .await;
        self.append_log(
            &handle,
            RunLogEntry::new(
                ORCHESTRATOR_LOG_STAGE,
                LogLevel::Info,
                format!("Starting pipeline '{pipeline}'"),
            ),
        )
        .await;

        let mut context = input;
        for step in self.pipeline.steps() {
            let step_result = match step {
                PipelineStep::Single(spec) => self.run_single(&handle, spec, &mut context).await,
                PipelineStep::FanOut { id, members } => {
                    self.run_fan_out(&handle, id, members, &mut context).await
                }
            };

            if let Err(message) = step_result {
                return self.finish_failed(&handle, context, message).await;
            }
        }

        self.finish_completed(&handle, context).await
    }

    async fn run_single(
        &self,
        handle: &RunHandle,
        spec: &StageSpec,
        context: &mut PipelineContext,
    ) -> std::result::Result<(), String> {
        handle.enter_stage(&spec.id);
        let ctx = Self::stage_input(handle, spec, context);
        self.announce_stage(handle, spec).await;

        let result = self.invoke_stage(spec, &ctx).await;
        self.apply_result(handle, spec, &ctx, result, context).await
    }

    async fn run_fan_out(
        &self,
        handle: &RunHandle,
        group_id: &str,
        members: &[StageSpec],
        context: &mut PipelineContext,
    ) -> std::result::Result<(), String> {
        handle.enter_stage(group_id);
        debug!(run_id = %handle.run_id(), group = group_id, members = members.len(), "Fanning out");

        let mut inputs = Vec::with_capacity(members.len());
        for spec in members {
            inputs.push((spec, Self::stage_input(handle, spec, context)));
            self.announce_stage(handle, spec).await;
        }

        let mut pending: FuturesUnordered<_> = inputs
            .iter()
            .enumerate()
            .map(|(index, (spec, ctx))| {
                self.spawn_member(index, StageSpec::clone(spec), ctx.clone())
            })
            .collect();

        // Every member is applied; the first required failure fails the group
        // once all members have finished.
        let mut failure = None;
        while let Some((index, joined)) = pending.next().await {
            let (spec, ctx) = &inputs[index];
            let result = joined.unwrap_or_else(|err| {
                error!(
                    run_id = %handle.run_id(),
                    stage = %spec.id,
                    error = %err,
                    "Fan-out member task failed"
                );
                let mut result = StageResult::failure(format!("Error in {}: {err}", spec.id));
                result.stage_id.clone_from(&spec.id);
                result.run_id = handle.run_id().to_string();
                result
            });
            if let Err(message) = self.apply_result(handle, spec, ctx, result, context).await {
                failure.get_or_insert(message);
            }
        }

        failure.map_or(Ok(()), Err)
    }

    /// Runs one fan-out member on its own task so it keeps progressing while
    /// sibling results are being recorded.
    fn spawn_member(
        &self,
        index: usize,
        spec: StageSpec,
        ctx: StageContext,
    ) -> impl Future<Output = (usize, std::result::Result<StageResult, JoinError>)> {
        let this = self.clone();
        tokio::spawn(async move { this.invoke_stage(&spec, &ctx).await })
            .map(move |joined| (index, joined))
    }

    fn stage_input(
        handle: &RunHandle,
        spec: &StageSpec,
        context: &PipelineContext,
    ) -> StageContext {
        let history = match spec.input {
            InputScope::History => handle.history(),
            InputScope::Context => Vec::new(),
        };
        StageContext::for_scope(handle.run_id(), &spec.id, spec.input, context, &history)
    }

    async fn announce_stage(&self, handle: &RunHandle, spec: &StageSpec) {
        info!(run_id = %handle.run_id(), stage = %spec.id, "Stage started");
        self.events
            .emit(PipelineEvent::StageStarted {
                run_id: handle.run_id().to_string(),
                stage_id: spec.id.clone(),
                timestamp: Utc::now(),
            })
            .await;
        self.append_log(
            handle,
            RunLogEntry::new(&spec.id, LogLevel::Info, format!("Starting {}", spec.id)),
        )
        .await;
    }

    /// Invokes a stage, retrying transient errors if the stage declares a
    /// retry policy. Never fails: errors and panics become failure results.
    async fn invoke_stage(&self, spec: &StageSpec, ctx: &StageContext) -> StageResult {
        let timer = StageTimer::start(&spec.id);

        let outcome = match &spec.retry {
            Some(config) => {
                let executor = RetryExecutor::new(config.clone(), Arc::clone(&self.classifier));
                executor
                    .run_with_retry_notify(
                        &spec.id,
                        || self.bridge.invoke(&spec.runner, ctx),
                        |attempt, delay, err: &StageError| {
                            self.events.try_emit(PipelineEvent::StageRetryScheduled {
                                run_id: ctx.run_id().to_string(),
                                stage_id: spec.id.clone(),
                                attempt,
                                delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                                error: err.to_string(),
                                timestamp: Utc::now(),
                            });
                        },
                    )
                    .await
            }
            None => self.bridge.invoke(&spec.runner, ctx).await,
        };

        let mut result = match outcome {
            Ok(result) => result,
            Err(err) => {
                error!(run_id = %ctx.run_id(), stage = %spec.id, error = %err, "Stage raised an error");
                StageResult::failure(format!("Error in {}: {err}", spec.id))
            }
        };

        result.stage_id.clone_from(&spec.id);
        result.run_id = ctx.run_id().to_string();
        result.execution_time_ms = timer.elapsed_ms();
        result
    }

    /// Records a stage result and applies its policy.
    ///
    /// Returns `Err(message)` when the run must fail.
    async fn apply_result(
        &self,
        handle: &RunHandle,
        spec: &StageSpec,
        ctx: &StageContext,
        result: StageResult,
        context: &mut PipelineContext,
    ) -> std::result::Result<(), String> {
        let run_id = handle.run_id();
        self.events
            .emit(PipelineEvent::StageFinished {
                run_id: run_id.to_string(),
                stage_id: spec.id.clone(),
                status: result.status,
                execution_time_ms: result.execution_time_ms,
                timestamp: Utc::now(),
            })
            .await;

        let audit = json!({
            "status": result.status,
            "confidence": result.confidence,
            "execution_time_ms": result.execution_time_ms,
            "summary": result.summary(self.config.log_summary_chars),
            "input_hash": content_hash(&ctx.input().to_value()),
            "output_hash": content_hash(&Value::Object(result.data.clone())),
        });
        handle.record_stage_result(result.clone());

        if result.is_failure() {
            if spec.is_required() {
                error!(run_id, stage = %spec.id, reason = %result.log, "Required stage failed");
                self.append_log(
                    handle,
                    RunLogEntry::new(&spec.id, LogLevel::Error, format!("Failed: {}", result.log))
                        .with_data(audit),
                )
                .await;
                return Err(result.log);
            }

            warn!(run_id, stage = %spec.id, reason = %result.log, "Optional stage failed, continuing");
            self.append_log(
                handle,
                RunLogEntry::new(
                    &spec.id,
                    LogLevel::Warning,
                    format!("Stage had issues: {}", result.log),
                )
                .with_data(audit),
            )
            .await;
            return Ok(());
        }

        let overwritten = context.merge(&result.data);
        if !overwritten.is_empty() {
            debug!(run_id, stage = %spec.id, keys = ?overwritten, "Merge overwrote existing keys");
        }
        if let Some(checkpoint) = spec.checkpoint {
            handle.advance_progress(checkpoint);
        }
        info!(
            run_id,
            stage = %spec.id,
            status = %result.status,
            elapsed_ms = result.execution_time_ms,
            "Stage finished"
        );
        self.append_log(
            handle,
            RunLogEntry::new(&spec.id, LogLevel::Success, format!("{} complete", spec.id))
                .with_data(audit),
        )
        .await;
        Ok(())
    }

    async fn finish_completed(&self, handle: &RunHandle, context: PipelineContext) -> RunOutcome {
        self.append_log(
            handle,
            RunLogEntry::new(ORCHESTRATOR_LOG_STAGE, LogLevel::Success, "Pipeline complete"),
        )
        .await;
        handle.complete(context.clone());
        let record = handle.snapshot();
        info!(run_id = %record.run_id, "Run completed");

        self.persist_final(&record, Some(context.clone())).await;
        self.emit_finished(&record).await;

        RunOutcome {
            run_id: record.run_id,
            status: RunStatus::Completed,
            context,
            error: None,
        }
    }

    async fn finish_failed(
        &self,
        handle: &RunHandle,
        context: PipelineContext,
        message: String,
    ) -> RunOutcome {
        handle.fail(message.clone());
        let record = handle.snapshot();
        error!(run_id = %record.run_id, error = %message, "Run failed");

        self.persist_final(&record, None).await;
        self.emit_finished(&record).await;

        RunOutcome {
            run_id: record.run_id,
            status: RunStatus::Failed,
            context,
            error: Some(message),
        }
    }

    async fn emit_finished(&self, record: &RunRecord) {
        self.events
            .emit(PipelineEvent::RunFinished {
                run_id: record.run_id.clone(),
                status: record.status,
                error: record.error.clone(),
                timestamp: Utc::now(),
            })
            .await;
    }

    async fn append_log(&self, handle: &RunHandle, entry: RunLogEntry) {
        if handle.append_log(entry.clone()) {
            if let Err(e) = self.store.append_log(handle.run_id(), &entry).await {
                warn!(run_id = %handle.run_id(), error = %e, "Failed to persist run log entry");
            }
        }
    }

    async fn persist_created(&self, handle: &RunHandle) {
        if let Err(e) = self.store.create_run(&handle.snapshot()).await {
            warn!(run_id = %handle.run_id(), error = %e, "Failed to persist new run");
        }
    }

    async fn persist_final(&self, record: &RunRecord, result: Option<PipelineContext>) {
        if let Err(e) = self.store.set_final_result(record, result).await {
            warn!(run_id = %record.run_id, error = %e, "Failed to persist final result");
        }
    }
}
