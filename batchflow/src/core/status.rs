//! Stage, item and batch status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a single stage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started yet.
    Pending,
    /// Stage is currently computing.
    Running,
    /// Stage finished and its output is recorded.
    Completed,
    /// Stage computation failed.
    Failed,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if moving to `next` follows pending -> running -> terminal.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running) | (Self::Running, Self::Completed | Self::Failed)
        )
    }
}

/// The overall status of an item run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// At least one stage is not finished and none failed.
    Processing,
    /// Every stage completed.
    Completed,
    /// A stage failed.
    Error,
}

impl Default for ItemStatus {
    fn default() -> Self {
        Self::Processing
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl ItemStatus {
    /// Returns true once no further stage transitions can occur.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Lifecycle of a batch run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Accepted, not yet run.
    Submitted,
    /// The snapshot stream is being consumed.
    Running,
    /// Every item was visited.
    Finished,
    /// Processing stopped early on request.
    Cancelled,
}

impl Default for BatchState {
    fn default() -> Self {
        Self::Submitted
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The state edge that produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// A stage moved to running.
    StageStarted,
    /// A stage moved to completed.
    StageCompleted,
    /// A stage moved to failed and the item to error.
    StageFailed,
    /// The item moved to completed.
    ItemCompleted,
}

impl Transition {
    /// Returns the lifecycle event name for this transition.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StageStarted => "stage.started",
            Self::StageCompleted => "stage.completed",
            Self::StageFailed => "stage.failed",
            Self::ItemCompleted => "item.completed",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Pending.to_string(), "pending");
        assert_eq!(StageStatus::Running.to_string(), "running");
        assert_eq!(StageStatus::Completed.to_string(), "completed");
        assert_eq!(StageStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_stage_status_transitions() {
        assert!(StageStatus::Pending.can_transition_to(StageStatus::Running));
        assert!(StageStatus::Running.can_transition_to(StageStatus::Completed));
        assert!(StageStatus::Running.can_transition_to(StageStatus::Failed));
        assert!(!StageStatus::Pending.can_transition_to(StageStatus::Completed));
        assert!(!StageStatus::Completed.can_transition_to(StageStatus::Running));
        assert!(!StageStatus::Failed.can_transition_to(StageStatus::Pending));
    }

    #[test]
    fn test_item_status_is_terminal() {
        assert!(ItemStatus::Completed.is_terminal());
        assert!(ItemStatus::Error.is_terminal());
        assert!(!ItemStatus::Processing.is_terminal());
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Completed).unwrap();
        assert_eq!(json, r#""completed""#);

        let deserialized: ItemStatus = serde_json::from_str(r#""error""#).unwrap();
        assert_eq!(deserialized, ItemStatus::Error);

        let json = serde_json::to_string(&Transition::ItemCompleted).unwrap();
        assert_eq!(json, r#""item_completed""#);
    }

    #[test]
    fn test_transition_event_type() {
        assert_eq!(Transition::StageStarted.event_type(), "stage.started");
        assert_eq!(Transition::StageFailed.to_string(), "stage.failed");
    }
}
