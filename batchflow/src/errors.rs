//! Error types for the batchflow engine.
//!
//! Synchronous failures (`EmptyBatch`, `OutOfRange`, unknown or already
//! started batches) are returned to the immediate caller. Stage failures are
//! captured as [`StageError`] and recorded on the run state instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for batchflow operations.
#[derive(Debug, Error)]
pub enum BatchflowError {
    /// A batch was submitted with no items.
    #[error("Cannot submit an empty batch")]
    EmptyBatch,

    /// An engine was built without any stages.
    #[error("Pipeline must declare at least one stage")]
    EmptyPipeline,

    /// The batch id is not registered with this engine.
    #[error("Unknown batch: {0}")]
    UnknownBatch(Uuid),

    /// The batch has already been run once.
    #[error("Batch {0} has already been started")]
    AlreadyStarted(Uuid),

    /// The words renderer was given a value outside its domain.
    #[error("{0}")]
    OutOfRange(#[from] OutOfRangeError),

    /// A stage computation failed.
    #[error("{0}")]
    StageComputation(#[from] StageError),

    /// Invalid engine or stage configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BatchflowError {
    /// Returns a stable machine-readable code for the error kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyBatch => "EMPTY_BATCH",
            Self::EmptyPipeline => "EMPTY_PIPELINE",
            Self::UnknownBatch(_) => "UNKNOWN_BATCH",
            Self::AlreadyStarted(_) => "ALREADY_STARTED",
            Self::OutOfRange(_) => "OUT_OF_RANGE",
            Self::StageComputation(_) => "STAGE_COMPUTATION",
            Self::Config(_) => "CONFIG",
            Self::Serialization(_) => "SERIALIZATION",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::UnknownBatch(id) | Self::AlreadyStarted(id) => {
                map.insert("batch_id".to_string(), serde_json::json!(id.to_string()));
            }
            Self::OutOfRange(err) => {
                map.insert("value".to_string(), serde_json::json!(err.value));
            }
            Self::StageComputation(err) => {
                if let Some(index) = err.stage_index {
                    map.insert("stage_index".to_string(), serde_json::json!(index));
                }
            }
            _ => {}
        }

        map
    }
}

/// Error raised when a number cannot be spelled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Value {value} is outside the supported range [0, {limit})")]
pub struct OutOfRangeError {
    /// The rejected value.
    pub value: i64,
    /// The exclusive upper bound of the domain.
    pub limit: i64,
}

impl OutOfRangeError {
    /// Creates a new out-of-range error.
    #[must_use]
    pub fn new(value: i64, limit: i64) -> Self {
        Self { value, limit }
    }
}

/// Error produced by a stage computation.
///
/// The engine records it on the failing stage run; it never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Stage computation failed: {message}")]
pub struct StageError {
    /// Human-readable failure message.
    pub message: String,
    /// The 1-based index of the failing stage, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_index: Option<usize>,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stage_index: None,
        }
    }

    /// Attributes the error to a stage.
    #[must_use]
    pub fn at_stage(mut self, index: usize) -> Self {
        self.stage_index = Some(index);
        self
    }
}

impl From<OutOfRangeError> for StageError {
    fn from(err: OutOfRangeError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("Invalid structured output: {err}"))
    }
}
