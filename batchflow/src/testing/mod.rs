//! Testing utilities for batchflow pipelines.
//!
//! This module provides:
//! - Mock stage computations
//! - Assertions over item and batch runs
//! - Input fixtures and a test pipeline harness

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_batch_invariants, assert_item_invariants, assert_item_status, assert_item_untouched,
    assert_stage_statuses,
};
pub use fixtures::{collect_snapshots, image_inputs, TestPipeline};
pub use mocks::{
    FailingCompute, PanickingCompute, RecordedCall, RecordingCompute, SlowCompute, StaticCompute,
};
