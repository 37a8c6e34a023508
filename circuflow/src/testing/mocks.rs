//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

use crate::context::{PipelineContext, StageContext};
use crate::core::{JsonMap, StageResult};
use crate::errors::StageError;
use crate::stages::{BlockingStage, Stage};

type Outcome = Result<StageResult, StageError>;

/// A scripted stage that records its inputs.
///
/// Queued outcomes are returned first, one per call; once the queue is
/// empty every call returns the fallback outcome.
#[derive(Debug)]
pub struct MockStage {
    id: String,
    script: Mutex<VecDeque<Outcome>>,
    fallback: Mutex<Outcome>,
    inputs: Mutex<Vec<PipelineContext>>,
}

impl MockStage {
    /// Creates a mock that succeeds with no data.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(StageResult::success_empty())),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Sets the fallback outcome.
    #[must_use]
    pub fn returning(self, outcome: Outcome) -> Self {
        *self.fallback.lock() = outcome;
        self
    }

    /// Queues an outcome ahead of the fallback.
    #[must_use]
    pub fn then(self, outcome: Outcome) -> Self {
        self.script.lock().push_back(outcome);
        self
    }

    /// Queues `count` copies of an error.
    #[must_use]
    pub fn erroring_times(self, count: usize, error: &StageError) -> Self {
        {
            let mut script = self.script.lock();
            for _ in 0..count {
                script.push_back(Err(error.clone()));
            }
        }
        self
    }

    /// Returns the number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Returns the input of every call, in call order.
    #[must_use]
    pub fn recorded_inputs(&self) -> Vec<PipelineContext> {
        self.inputs.lock().clone()
    }

    /// Clears recorded calls.
    pub fn reset(&self) {
        self.inputs.lock().clear();
    }
}

#[async_trait]
impl Stage for MockStage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        self.inputs.lock().push(ctx.input().clone());
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| self.fallback.lock().clone())
    }
}

/// A stage that always succeeds with fixed data.
#[derive(Debug, Clone)]
pub struct SuccessStage {
    id: String,
    data: JsonMap,
}

impl SuccessStage {
    /// Creates a success stage with no data.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: JsonMap::new(),
        }
    }

    /// Adds a key to the produced data.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

#[async_trait]
impl Stage for SuccessStage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<StageResult, StageError> {
        Ok(StageResult::success(self.data.clone()))
    }
}

/// A stage that reports a domain failure.
#[derive(Debug, Clone)]
pub struct FailingStage {
    id: String,
    log: String,
}

impl FailingStage {
    /// Creates a failing stage with the given log.
    #[must_use]
    pub fn new(id: impl Into<String>, log: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            log: log.into(),
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<StageResult, StageError> {
        Ok(StageResult::failure(self.log.clone()))
    }
}

/// A stage that sleeps before succeeding with fixed data.
#[derive(Debug, Clone)]
pub struct SlowStage {
    inner: SuccessStage,
    delay: Duration,
}

impl SlowStage {
    /// Creates a slow stage.
    #[must_use]
    pub fn new(id: impl Into<String>, delay: Duration) -> Self {
        Self {
            inner: SuccessStage::new(id),
            delay,
        }
    }

    /// Adds a key to the produced data.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inner = self.inner.with_value(key, value);
        self
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        tokio::time::sleep(self.delay).await;
        self.inner.execute(ctx).await
    }
}

/// A blocking stage that holds its thread before succeeding.
#[derive(Debug, Clone)]
pub struct BlockingCalcStage {
    id: String,
    data: JsonMap,
    work: Duration,
}

impl BlockingCalcStage {
    /// Creates a blocking stage that works for `work`.
    #[must_use]
    pub fn new(id: impl Into<String>, work: Duration) -> Self {
        Self {
            id: id.into(),
            data: JsonMap::new(),
            work,
        }
    }

    /// Adds a key to the produced data.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

impl BlockingStage for BlockingCalcStage {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(&self, _ctx: &StageContext) -> Result<StageResult, StageError> {
        std::thread::sleep(self.work);
        Ok(StageResult::success(self.data.clone()))
    }
}

/// A stage that panics.
#[derive(Debug, Clone)]
pub struct PanickingStage {
    id: String,
    message: String,
}

impl PanickingStage {
    /// Creates a stage that panics with `message`.
    #[must_use]
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn id(&self) -> &str {
        &self.id
    }

    #[allow(clippy::panic)]
    async fn execute(&self, _ctx: &StageContext) -> Result<StageResult, StageError> {
        panic!("{}", self.message)
    }
}
