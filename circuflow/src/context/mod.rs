//! Context management for pipeline execution.
//!
//! This module provides:
//! - The accumulating [`PipelineContext`] owned by one run
//! - The per-invocation [`StageContext`] handed to stages
//! - [`InputScope`], selecting what a stage gets to see

mod pipeline;
mod stage;

pub use pipeline::PipelineContext;
pub use stage::{InputScope, StageContext};
