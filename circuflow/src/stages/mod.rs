//! Stage traits and adapters.
//!
//! Stages are the analytical units a pipeline sequences. A stage is either
//! *suspending* (implements [`Stage`], awaited directly) or *blocking*
//! (implements [`BlockingStage`], offloaded to the worker pool). The choice
//! is declared once through [`StageRunner`]; the orchestrator only ever
//! talks to the [`ExecutionBridge`](crate::bridge::ExecutionBridge).
//!
//! Expected domain failures are returned as `Ok(StageResult::failure(..))`.
//! `Err(StageError)` is reserved for problems the stage did not anticipate,
//! including errors from rate-limited collaborators that the retry executor
//! may classify as transient.

use crate::context::StageContext;
use crate::core::StageResult;
use crate::errors::StageError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

/// Trait for suspending (async) stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the id of the stage.
    fn id(&self) -> &str;

    /// Executes the stage against its input.
    async fn execute(&self, ctx: &StageContext) -> Result<StageResult, StageError>;
}

/// Trait for blocking stages.
///
/// Implementations may block the calling thread (CPU-heavy calculators,
/// synchronous clients). They always run on the blocking worker pool.
pub trait BlockingStage: Send + Sync + Debug {
    /// Returns the id of the stage.
    fn id(&self) -> &str;

    /// Executes the stage against its input.
    fn execute(&self, ctx: &StageContext) -> Result<StageResult, StageError>;
}

/// A stage implementation tagged with how it must be driven.
#[derive(Debug, Clone)]
pub enum StageRunner {
    /// Offloaded to the shared blocking worker pool.
    Blocking(Arc<dyn BlockingStage>),
    /// Awaited directly on the run's task.
    Suspending(Arc<dyn Stage>),
}

impl StageRunner {
    /// Wraps a blocking stage.
    pub fn blocking(stage: impl BlockingStage + 'static) -> Self {
        Self::Blocking(Arc::new(stage))
    }

    /// Wraps a suspending stage.
    pub fn suspending(stage: impl Stage + 'static) -> Self {
        Self::Suspending(Arc::new(stage))
    }

    /// Returns the id of the wrapped stage.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Blocking(stage) => stage.id(),
            Self::Suspending(stage) => stage.id(),
        }
    }

    /// Returns true if the stage runs on the blocking pool.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocking(_))
    }
}

/// A simple function-based blocking stage.
pub struct FnStage<F>
where
    F: Fn(&StageContext) -> Result<StageResult, StageError> + Send + Sync,
{
    id: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext) -> Result<StageResult, StageError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(id: impl Into<String>, func: F) -> Self {
        Self { id: id.into(), func }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext) -> Result<StageResult, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("id", &self.id).finish()
    }
}

impl<F> BlockingStage for FnStage<F>
where
    F: Fn(&StageContext) -> Result<StageResult, StageError> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        (self.func)(ctx)
    }
}

/// An async function-based stage.
///
/// The closure receives an owned [`StageContext`] so the returned future
/// does not borrow from the caller.
pub struct AsyncFnStage<F, Fut>
where
    F: Fn(StageContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageResult, StageError>> + Send,
{
    id: String,
    func: F,
    _phantom: std::marker::PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnStage<F, Fut>
where
    F: Fn(StageContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageResult, StageError>> + Send,
{
    /// Creates a new async function-based stage.
    pub fn new(id: impl Into<String>, func: F) -> Self {
        Self {
            id: id.into(),
            func,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<F, Fut> Debug for AsyncFnStage<F, Fut>
where
    F: Fn(StageContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageResult, StageError>> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStage").field("id", &self.id).finish()
    }
}

#[async_trait]
impl<F, Fut> Stage for AsyncFnStage<F, Fut>
where
    F: Fn(StageContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageResult, StageError>> + Send,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        (self.func)(ctx.clone()).await
    }
}

/// A stage that succeeds with no data.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    id: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<StageResult, StageError> {
        Ok(StageResult::success_empty())
    }
}
