//! Core domain model types for batchflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Stage, item and batch status enums
//! - Raw inputs and batch items
//! - Stage, item and batch run records
//! - Snapshots handed to observers

mod item;
mod run;
mod snapshot;
mod status;

pub use item::{BatchItem, RawInput};
pub use run::{BatchRun, BatchSummary, ItemRun, StageResult, StageRun};
pub use snapshot::Snapshot;
pub use status::{BatchState, ItemStatus, StageStatus, Transition};
