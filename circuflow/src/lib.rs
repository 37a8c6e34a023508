//! # Circuflow
//!
//! A workflow orchestration engine for staged analytical pipelines.
//!
//! Circuflow runs a fixed sequence of analytical stages against a shared,
//! accumulating context and produces a traceable final result. It provides:
//!
//! - **Stage contract**: a uniform [`StageResult`](core::StageResult) envelope
//!   with status, data, confidence and provenance
//! - **Sequencing**: ordered steps with concurrent fan-out groups and
//!   required/optional failure policies
//! - **Retry**: exponential backoff for transient collaborator errors
//! - **Execution bridge**: blocking and async stages behind one interface
//! - **Run registry**: status, progress and logs readable while runs execute
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use circuflow::prelude::*;
//!
//! let pipeline = PipelineBuilder::new("assessment")
//!     .stage(StageSpec::from_runner(StageRunner::suspending(Intake)).required())
//!     .fan_out("calculators", vec![
//!         StageSpec::from_runner(StageRunner::blocking(ImpactCalculator)),
//!         StageSpec::from_runner(StageRunner::blocking(CircularityCalculator)),
//!     ])
//!     .build()?;
//!
//! let orchestrator = PipelineOrchestrator::new(pipeline, OrchestratorConfig::default())?;
//! let run_id = orchestrator.submit(PipelineContext::from_value(input)?)?;
//! let status = orchestrator.registry().get_status(&run_id)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod bridge;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod retry;
pub mod stages;
pub mod store;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bridge::ExecutionBridge;
    pub use crate::config::OrchestratorConfig;
    pub use crate::context::{InputScope, PipelineContext, StageContext};
    pub use crate::core::{
        ProvenanceRecord, ResponseEnvelope, StagePolicy, StageResult, StageStatus,
    };
    pub use crate::errors::{CircuflowError, PipelineValidationError, StageError, StoreError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        standard_pipeline, PipelineBuilder, PipelineDefinition, PipelineOrchestrator,
        PipelineStep, RunOutcome, StageSpec, StandardStages,
    };
    pub use crate::registry::{RunRecord, RunRegistry, RunStatus};
    pub use crate::retry::{RetryConfig, RetryExecutor, SignalClassifier};
    pub use crate::stages::{AsyncFnStage, BlockingStage, FnStage, Stage, StageRunner};
    pub use crate::store::{InMemoryRunStore, JsonFileRunStore, NoOpRunStore, RunStore};
}
