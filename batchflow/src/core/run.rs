//! Per-stage, per-item and per-batch run records.
//!
//! The engine owns and mutates these; observers only ever see clones.

use super::{BatchItem, BatchState, ItemStatus, StageStatus};
use crate::errors::StageError;
use crate::utils::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The value a stage computation produces on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// Console lines shown for the stage.
    #[serde(default)]
    pub output_lines: Vec<String>,
    /// Optional typed payload, e.g. extracted fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<serde_json::Value>,
}

impl StageResult {
    /// Creates a result with console lines only.
    #[must_use]
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            output_lines: lines.into_iter().map(Into::into).collect(),
            structured_output: None,
        }
    }

    /// Creates an empty result.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attaches a structured payload.
    #[must_use]
    pub fn with_structured(mut self, value: serde_json::Value) -> Self {
        self.structured_output = Some(value);
        self
    }

    /// Serializes `value` and attaches it as the structured payload.
    pub fn with_serialized<T: Serialize>(self, value: &T) -> Result<Self, StageError> {
        Ok(self.with_structured(serde_json::to_value(value)?))
    }
}

/// Mutable record of one stage for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRun {
    /// 1-based stage position.
    pub stage_index: usize,
    /// Stage label, copied from the descriptor.
    pub description: String,
    /// Current status.
    pub status: StageStatus,
    /// Console lines, set on completion.
    #[serde(default)]
    pub output_lines: Vec<String>,
    /// Structured payload, set on completion when the stage produces one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<serde_json::Value>,
    /// Failure message, set when the stage fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the stage started running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// When the stage reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
}

impl StageRun {
    /// Creates a pending stage run.
    #[must_use]
    pub fn pending(stage_index: usize, description: impl Into<String>) -> Self {
        Self {
            stage_index,
            description: description.into(),
            status: StageStatus::Pending,
            output_lines: Vec::new(),
            structured_output: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub(crate) fn start(&mut self) {
        debug_assert!(self.status.can_transition_to(StageStatus::Running));
        self.status = StageStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn complete(&mut self, result: StageResult) {
        debug_assert!(self.status.can_transition_to(StageStatus::Completed));
        self.status = StageStatus::Completed;
        self.output_lines = result.output_lines;
        self.structured_output = result.structured_output;
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, error: &StageError) {
        debug_assert!(self.status.can_transition_to(StageStatus::Failed));
        self.status = StageStatus::Failed;
        self.error = Some(error.message.clone());
        self.finished_at = Some(Utc::now());
    }

    /// Returns the wall-clock time spent in the stage, once finished.
    #[must_use]
    pub fn duration_ms(&self) -> Option<f64> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        let micros = (finished - started).num_microseconds()?;
        #[allow(clippy::cast_precision_loss)]
        Some(micros as f64 / 1000.0)
    }
}

/// One item with its stage runs and overall status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRun {
    /// The submitted item.
    pub item: BatchItem,
    /// One run per stage, in stage order.
    pub stages: Vec<StageRun>,
    /// Overall status, always consistent with `stages`.
    pub status: ItemStatus,
}

impl ItemRun {
    /// Creates an item run with every stage pending.
    #[must_use]
    pub fn new<'a, I>(item: BatchItem, stages: I) -> Self
    where
        I: IntoIterator<Item = (usize, &'a str)>,
    {
        Self {
            item,
            stages: stages
                .into_iter()
                .map(|(index, description)| StageRun::pending(index, description))
                .collect(),
            status: ItemStatus::Processing,
        }
    }

    /// Derives the overall status from the stage runs.
    #[must_use]
    pub fn derived_status(&self) -> ItemStatus {
        if self.stages.iter().any(|s| s.status == StageStatus::Failed) {
            ItemStatus::Error
        } else if self.stages.iter().all(|s| s.status == StageStatus::Completed) {
            ItemStatus::Completed
        } else {
            ItemStatus::Processing
        }
    }

    pub(crate) fn refresh_status(&mut self) {
        self.status = self.derived_status();
    }

    /// Returns the stage currently running, if any.
    #[must_use]
    pub fn current_stage(&self) -> Option<&StageRun> {
        self.stages.iter().find(|s| s.status == StageStatus::Running)
    }

    /// Returns the stage run at a 1-based index.
    #[must_use]
    pub fn stage(&self, index: usize) -> Option<&StageRun> {
        index.checked_sub(1).and_then(|i| self.stages.get(i))
    }

    /// Returns the structured output of a completed stage.
    #[must_use]
    pub fn structured_output(&self, index: usize) -> Option<&serde_json::Value> {
        self.stage(index).and_then(|s| s.structured_output.as_ref())
    }

    /// Returns the number of completed stages.
    #[must_use]
    pub fn completed_stages(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Completed)
            .count()
    }

    /// Returns the fraction of completed stages in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        if self.stages.is_empty() {
            return 1.0;
        }
        self.completed_stages() as f64 / self.stages.len() as f64
    }

    /// Returns the failure message, if a stage failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.stages.iter().find_map(|s| s.error.as_deref())
    }
}

/// Counts of items by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total items.
    pub total: usize,
    /// Items still processing (including unstarted and cancelled ones).
    pub processing: usize,
    /// Items that completed.
    pub completed: usize,
    /// Items that failed.
    pub error: usize,
}

/// The ordered item runs of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRun {
    /// Batch id.
    pub id: Uuid,
    /// When the batch was accepted.
    pub created_at: Timestamp,
    /// Lifecycle of the run as a whole.
    pub state: BatchState,
    /// Item runs in submission order.
    pub items: Vec<ItemRun>,
    /// Reason given when the batch was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl BatchRun {
    /// Creates a submitted batch.
    #[must_use]
    pub fn new(items: Vec<ItemRun>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            state: BatchState::Submitted,
            items,
            cancel_reason: None,
        }
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the batch has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item run at a 0-based position.
    #[must_use]
    pub fn item(&self, index: usize) -> Option<&ItemRun> {
        self.items.get(index)
    }

    /// Returns true once every item reached a terminal status.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(|i| i.status.is_terminal())
    }

    /// Counts items by status.
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        self.items.iter().fold(
            BatchSummary {
                total: self.items.len(),
                ..BatchSummary::default()
            },
            |mut acc, item| {
                match item.status {
                    ItemStatus::Processing => acc.processing += 1,
                    ItemStatus::Completed => acc.completed += 1,
                    ItemStatus::Error => acc.error += 1,
                }
                acc
            },
        )
    }
}
