//! Pipeline building and execution.
//!
//! This module provides:
//! - A validating pipeline builder
//! - The batch engine and its lazy snapshot stream

mod builder;
mod engine;


pub use builder::PipelineBuilder;
pub use engine::{PipelineEngine, SnapshotStream};
