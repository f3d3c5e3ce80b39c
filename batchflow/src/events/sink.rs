//! Event sink trait and implementations.

use crate::utils::Timestamp;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn, Level};

/// Receives batch lifecycle events.
///
/// The engine emits one event per state transition (`stage.started`,
/// `stage.completed`, `stage.failed`, `item.completed`) and per batch
/// lifecycle change (`batch.submitted`, `batch.started`, `batch.finished`,
/// `batch.cancelled`, `batch.cleared`), in snapshot order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Delivers an event from the snapshot stream.
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Delivers an event from a synchronous engine call.
    ///
    /// Must return promptly and never panic.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards every event. The engine's default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Forwards events to `tracing`.
///
/// Routine events are logged at the configured level; `stage.failed` and
/// `batch.cancelled` always go out at `WARN`.
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
    /// Creates a logging sink for routine events at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a sink that logs routine events at `DEBUG`.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log(&self, event_type: &str, data: Option<&Value>) {
        let field = |key: &str| data.and_then(|d| d.get(key)).cloned().unwrap_or(Value::Null);
        let batch_id = field("batch_id");
        let item_index = field("item_index");
        let stage = field("stage");

        if matches!(event_type, "stage.failed" | "batch.cancelled") {
            warn!(
                event_type,
                %batch_id,
                %item_index,
                %stage,
                error = %field("error"),
                reason = %field("reason"),
                "Batch event"
            );
        } else if self.level == Level::DEBUG {
            debug!(event_type, %batch_id, %item_index, %stage, "Batch event");
        } else {
            info!(event_type, %batch_id, %item_index, %stage, "Batch event");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.log(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.log(event_type, data.as_ref());
    }
}

/// One event captured by a [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Event name, e.g. `stage.completed`.
    pub event_type: String,
    /// Event payload.
    pub data: Option<Value>,
    /// When the sink received the event.
    pub received_at: Timestamp,
}

impl RecordedEvent {
    /// Returns a top-level payload field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }
}

/// Keeps every event in memory, for tests and in-process observers.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every event received so far.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.read().clone()
    }

    /// Returns the event names in arrival order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Returns the events whose name starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<RecordedEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Returns the events carrying the given batch id.
    #[must_use]
    pub fn events_for_batch(&self, batch_id: &str) -> Vec<RecordedEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.field("batch_id").and_then(Value::as_str) == Some(batch_id))
            .cloned()
            .collect()
    }

    /// Returns the number of events received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Drops every stored event.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    fn record(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push(RecordedEvent {
            event_type: event_type.to_string(),
            data,
            received_at: Utc::now(),
        });
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_noop_and_logging_sinks_accept_anything() {
        NoOpEventSink.emit("stage.started", None).await;
        NoOpEventSink.try_emit("batch.submitted", Some(json!({"items": 2})));

        let sink = LoggingEventSink::debug();
        sink.emit("stage.completed", Some(json!({"batch_id": "b", "stage": "load"})))
            .await;
        sink.try_emit("stage.failed", Some(json!({"error": "unreadable"})));
        sink.try_emit("batch.started", Some(json!("not an object")));
    }

    #[tokio::test]
    async fn test_collecting_sink_keeps_arrival_order() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.try_emit("batch.started", Some(json!({"batch_id": "a"})));
        sink.emit("stage.started", Some(json!({"batch_id": "a", "stage_index": 1})))
            .await;
        sink.emit("item.completed", Some(json!({"batch_id": "b"}))).await;

        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.event_types(),
            vec!["batch.started", "stage.started", "item.completed"]
        );
        assert_eq!(sink.events()[1].field("stage_index"), Some(&json!(1)));
        assert!(sink.events()[0].received_at <= sink.events()[2].received_at);
    }

    #[tokio::test]
    async fn test_collecting_sink_filters() {
        let sink = CollectingEventSink::new();
        sink.emit("stage.started", Some(json!({"batch_id": "a"}))).await;
        sink.emit("stage.completed", Some(json!({"batch_id": "b"}))).await;
        sink.emit("item.completed", None).await;

        assert_eq!(sink.events_of_type("stage.").len(), 2);
        assert_eq!(sink.events_for_batch("b").len(), 1);
        assert!(sink.events_for_batch("c").is_empty());

        sink.clear();
        assert!(sink.is_empty());
    }
}
