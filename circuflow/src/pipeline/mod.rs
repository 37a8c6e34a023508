//! Pipeline declaration and execution.
//!
//! This module provides:
//! - Stage declarations and fan-out steps
//! - A validating pipeline builder
//! - The standard analytical pipeline
//! - The run orchestrator

mod builder;
mod orchestrator;
mod spec;
mod standard;

#[cfg(test)]
mod integration_tests;

pub use builder::{PipelineBuilder, PipelineDefinition};
pub use orchestrator::{PipelineOrchestrator, RunOutcome};
pub use spec::{PipelineStep, StageSpec};
pub use standard::{stage_ids, standard_pipeline, StandardStages, STANDARD_PIPELINE_NAME};
