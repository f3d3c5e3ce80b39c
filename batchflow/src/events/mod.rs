//! Event sink system for observability.
//!
//! Sinks receive a named event for every batch lifecycle change and every
//! stage or item transition, in the same order snapshots are produced.

mod sink;

#[cfg(test)]
pub use sink::MockEventSink;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

/// Event emitted when a batch is accepted.
pub const BATCH_SUBMITTED: &str = "batch.submitted";
/// Event emitted when a batch's snapshot stream starts.
pub const BATCH_STARTED: &str = "batch.started";
/// Event emitted when every item of a batch was visited.
pub const BATCH_FINISHED: &str = "batch.finished";
/// Event emitted when a batch is cancelled.
pub const BATCH_CANCELLED: &str = "batch.cancelled";
/// Event emitted when a batch is cleared from the engine.
pub const BATCH_CLEARED: &str = "batch.cleared";
