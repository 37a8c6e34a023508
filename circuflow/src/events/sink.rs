//! Event sink trait and implementations.

use super::PipelineEvent;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, Level};

/// Receiver for orchestration events.
///
/// Sinks must never fail the run: errors are handled inside the sink.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event: PipelineEvent) {
        self.try_emit(event);
    }

    /// Emits an event without waiting.
    fn try_emit(&self, event: PipelineEvent);
}

/// A sink that discards all events. Used when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: PipelineEvent) {}
}

/// A sink that writes every event through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event: &PipelineEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        if self.level == Level::DEBUG {
            debug!(
                event_type = event.event_type(),
                run_id = %event.run_id(),
                stage = event.stage_id().unwrap_or_default(),
                event_data = %payload,
                "Event: {}", event.event_type()
            );
        } else {
            info!(
                event_type = event.event_type(),
                run_id = %event.run_id(),
                stage = event.stage_id().unwrap_or_default(),
                event_data = %payload,
                "Event: {}", event.event_type()
            );
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: PipelineEvent) {
        self.log_event(&event);
    }
}

/// A sink that keeps every event in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the dotted names of all collected events, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.read().iter().map(PipelineEvent::event_type).collect()
    }

    /// Returns events whose name starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type().starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: PipelineEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn started(stage: &str) -> PipelineEvent {
        PipelineEvent::StageStarted {
            run_id: "r1".into(),
            stage_id: stage.into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_noop_and_logging_sinks() {
        NoOpEventSink.emit(started("intake")).await;
        LoggingEventSink::default().emit(started("intake")).await;
        LoggingEventSink::debug().try_emit(started("intake"));
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(started("intake")).await;
        sink.try_emit(PipelineEvent::RunStarted {
            run_id: "r1".into(),
            pipeline: "standard".into(),
            timestamp: Utc::now(),
        });

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.event_types(), vec!["stage.started", "run.started"]);
        assert_eq!(sink.events_of_type("stage.").len(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }
}
