//! # Batchflow
//!
//! A staged batch pipeline engine with per-item progress snapshots.
//!
//! Batchflow runs a batch of inputs through a fixed, ordered list of stages:
//!
//! - **Sequential execution**: items one at a time in submission order,
//!   stages strictly in index order
//! - **Lazy snapshots**: every state transition yields a deep copy of the
//!   affected item to whoever polls the stream
//! - **Failure isolation**: a failing stage stops its item, never the batch
//! - **Cooperative cancellation**: honoured at stage boundaries
//! - **Lifecycle events**: pluggable sinks receive one event per transition
//!
//! ## Quick Start
//!
//! ```
//! use batchflow::prelude::*;
//! use futures::StreamExt;
//!
//! let engine = PipelineEngine::builder("greeting")
//!     .stage(
//!         "Say hello",
//!         FnCompute::new("hello", |input: StageInput<'_>| {
//!             Ok(StageResult::lines([format!("Hello {}", input.item.label)]))
//!         }),
//!     )
//!     .build()?;
//!
//! let batch = engine.submit([RawInput::named("world.png")])?;
//! let snapshots: Vec<Snapshot> = futures::executor::block_on(engine.run(batch.id)?.collect());
//!
//! assert_eq!(snapshots.len(), 3);
//! assert_eq!(snapshots[1].item.stages[0].output_lines, vec!["Hello world.png"]);
//! # Ok::<(), BatchflowError>(())
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

pub mod cancellation;
#[cfg(feature = "cheque")]
pub mod cheque;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod utils;
pub mod words;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::EngineConfig;
    pub use crate::core::{
        BatchItem, BatchRun, BatchState, BatchSummary, ItemRun, ItemStatus, RawInput, Snapshot,
        StageResult, StageRun, StageStatus, Transition,
    };
    pub use crate::errors::{BatchflowError, OutOfRangeError, StageError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{PipelineBuilder, PipelineEngine, SnapshotStream};
    pub use crate::stages::{AsyncFnCompute, FnCompute, StageCompute, StageDescriptor, StageInput};
    pub use crate::utils::{iso_timestamp, Timestamp};
    pub use crate::words::to_words;
}
