//! Uniform invocation of blocking and suspending stages.

use crate::context::StageContext;
use crate::core::StageResult;
use crate::errors::StageError;
use crate::stages::StageRunner;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Default number of blocking stages allowed to run at once.
pub const DEFAULT_MAX_BLOCKING_WORKERS: usize = 8;

/// Runs a stage regardless of its execution style.
///
/// Blocking stages are offloaded to the runtime's blocking pool, gated by a
/// permit pool shared by every clone of the bridge. Suspending stages are
/// awaited directly. Panics in either style come back as
/// [`StageError::Panicked`].
#[derive(Debug, Clone)]
pub struct ExecutionBridge {
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl ExecutionBridge {
    /// Creates a bridge allowing `max_workers` concurrent blocking stages.
    ///
    /// A value of zero is treated as one.
    #[must_use]
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    /// Returns the size of the blocking worker pool.
    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Returns the number of blocking slots currently free.
    #[must_use]
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Invokes `runner` against `ctx`, suspending until it finishes.
    pub async fn invoke(
        &self,
        runner: &StageRunner,
        ctx: &StageContext,
    ) -> Result<StageResult, StageError> {
        match runner {
            StageRunner::Blocking(stage) => {
                let permit = Arc::clone(&self.permits)
                    .acquire_owned()
                    .await
                    .map_err(|e| StageError::WorkerPool(e.to_string()))?;

                let stage = Arc::clone(stage);
                let ctx = ctx.clone();
                debug!(stage = %ctx.stage_id(), "Offloading blocking stage");

                let joined = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    stage.execute(&ctx)
                })
                .await;

                match joined {
                    Ok(result) => result,
                    Err(err) if err.is_panic() => {
                        let message = panic_message(err.into_panic().as_ref());
                        warn!(stage = %runner.id(), panic = %message, "Blocking stage panicked");
                        Err(StageError::Panicked(message))
                    }
                    Err(err) => Err(StageError::WorkerPool(err.to_string())),
                }
            }
            StageRunner::Suspending(stage) => {
                match AssertUnwindSafe(stage.execute(ctx)).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        warn!(stage = %runner.id(), panic = %message, "Stage panicked");
                        Err(StageError::Panicked(message))
                    }
                }
            }
        }
    }
}

impl Default for ExecutionBridge {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOCKING_WORKERS)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
