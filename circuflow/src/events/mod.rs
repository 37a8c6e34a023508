//! Event sink system for observability.
//!
//! The orchestrator reports run and stage lifecycle changes as
//! [`PipelineEvent`]s to an [`EventSink`]. Events are advisory; the run
//! registry remains the source of truth for run state.

mod event;
mod sink;

pub use event::PipelineEvent;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
