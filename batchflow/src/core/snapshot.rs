//! Immutable point-in-time views handed to observers.

use super::{ItemRun, Transition};
use crate::utils::{format_timestamp, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A deep copy of one item run taken right after a state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The batch the item belongs to.
    pub batch_id: Uuid,
    /// Strictly increasing position within the batch's snapshot stream.
    pub sequence: u64,
    /// 0-based position of the item in the batch.
    pub item_index: usize,
    /// The edge that produced this snapshot.
    pub transition: Transition,
    /// 1-based stage index the transition refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_index: Option<usize>,
    /// The item state after the transition.
    pub item: ItemRun,
    /// When the snapshot was taken.
    pub taken_at: Timestamp,
}

impl Snapshot {
    /// Creates a new snapshot.
    #[must_use]
    pub fn new(
        batch_id: Uuid,
        sequence: u64,
        item_index: usize,
        transition: Transition,
        stage_index: Option<usize>,
        item: ItemRun,
    ) -> Self {
        Self {
            batch_id,
            sequence,
            item_index,
            transition,
            stage_index,
            item,
            taken_at: Utc::now(),
        }
    }

    /// Returns true if the item reached a terminal status in this snapshot.
    #[must_use]
    pub fn is_item_terminal(&self) -> bool {
        self.item.status.is_terminal()
    }

    /// Builds the lifecycle event payload for this snapshot.
    #[must_use]
    pub fn event_payload(&self) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "batch_id": self.batch_id.to_string(),
            "sequence": self.sequence,
            "item_index": self.item_index,
            "item_id": self.item.item.id.to_string(),
            "label": self.item.item.label,
            "item_status": self.item.status.to_string(),
            "taken_at": format_timestamp(&self.taken_at),
        });

        if let Some(stage) = self.stage_index.and_then(|i| self.item.stage(i)) {
            payload["stage_index"] = serde_json::json!(stage.stage_index);
            payload["stage"] = serde_json::json!(stage.description);
            payload["stage_status"] = serde_json::json!(stage.status.to_string());
            if let Some(duration) = stage.duration_ms() {
                payload["duration_ms"] = serde_json::json!(duration);
            }
            if let Some(ref error) = stage.error {
                payload["error"] = serde_json::json!(error);
            }
        }

        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BatchItem, ItemStatus, RawInput};

    fn snapshot(transition: Transition, stage_index: Option<usize>) -> Snapshot {
        let item = BatchItem::from_input(RawInput::named("front.jpg"), "CHQ3001");
        let run = ItemRun::new(item, [(1, "load"), (2, "analyse")]);
        Snapshot::new(Uuid::new_v4(), 7, 1, transition, stage_index, run)
    }

    #[test]
    fn test_event_payload_includes_stage() {
        let snap = snapshot(Transition::StageStarted, Some(2));
        let payload = snap.event_payload();

        assert_eq!(payload["sequence"], 7);
        assert_eq!(payload["item_index"], 1);
        assert_eq!(payload["stage"], "analyse");
        assert_eq!(payload["stage_status"], "pending");
        assert_eq!(payload["label"], "front.jpg");
        assert!(payload["taken_at"].as_str().unwrap().ends_with("+00:00"));
    }

    #[test]
    fn test_event_payload_without_stage() {
        let snap = snapshot(Transition::ItemCompleted, None);
        let payload = snap.event_payload();
        assert!(payload.get("stage").is_none());
        assert_eq!(payload["item_status"], ItemStatus::Processing.to_string());
        assert!(!snap.is_item_terminal());
    }

    #[test]
    fn test_snapshot_serialization() {
        let snap = snapshot(Transition::StageCompleted, Some(1));
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["transition"], "stage_completed");
        assert_eq!(json["item"]["stages"][0]["status"], "pending");

        let back: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back.sequence, snap.sequence);
    }
}
