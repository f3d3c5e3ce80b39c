//! Test assertions for batch and item runs.

use crate::core::{BatchRun, ItemRun, ItemStatus, StageStatus};

/// Asserts that the item has the expected overall status.
pub fn assert_item_status(item: &ItemRun, expected: ItemStatus) {
    assert_eq!(
        item.status, expected,
        "Expected item '{}' to be {:?}, got {:?}",
        item.item.label, expected, item.status
    );
}

/// Asserts the status of every stage of the item, in order.
pub fn assert_stage_statuses(item: &ItemRun, expected: &[StageStatus]) {
    let actual: Vec<StageStatus> = item.stages.iter().map(|s| s.status).collect();
    assert_eq!(
        actual, expected,
        "Unexpected stage statuses for item '{}'",
        item.item.label
    );
}

/// Asserts that the item has not progressed at all.
pub fn assert_item_untouched(item: &ItemRun) {
    assert_item_status(item, ItemStatus::Processing);
    assert!(
        item.stages.iter().all(|s| s.status == StageStatus::Pending),
        "Expected every stage of '{}' to be pending",
        item.item.label
    );
}

/// Asserts the structural invariants of an item run.
///
/// - the stored status matches the status derived from the stages
/// - stages after a running or failed stage are pending
/// - outputs are only present on completed stages
pub fn assert_item_invariants(item: &ItemRun) {
    assert_eq!(
        item.status,
        item.derived_status(),
        "Stored status of '{}' disagrees with its stages",
        item.item.label
    );

    let mut seen_unfinished = false;
    for stage in &item.stages {
        if seen_unfinished {
            assert_eq!(
                stage.status,
                StageStatus::Pending,
                "Stage {} of '{}' moved before an earlier stage completed",
                stage.stage_index,
                item.item.label
            );
        }
        if stage.status != StageStatus::Completed {
            seen_unfinished = true;
            assert!(
                stage.output_lines.is_empty() && stage.structured_output.is_none(),
                "Stage {} of '{}' has output without completing",
                stage.stage_index,
                item.item.label
            );
        }
    }
}

/// Asserts the invariants of every item of the batch.
pub fn assert_batch_invariants(batch: &BatchRun) {
    for item in &batch.items {
        assert_item_invariants(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BatchItem, RawInput};

    fn item_run() -> ItemRun {
        ItemRun::new(
            BatchItem::from_input(RawInput::named("a"), "T0"),
            [(1, "one"), (2, "two")],
        )
    }

    #[test]
    fn test_untouched_item_passes() {
        let run = item_run();
        assert_item_untouched(&run);
        assert_item_invariants(&run);
        assert_stage_statuses(&run, &[StageStatus::Pending, StageStatus::Pending]);
    }

    #[test]
    #[should_panic(expected = "moved before an earlier stage completed")]
    fn test_out_of_order_stage_detected() {
        let mut run = item_run();
        run.stages[1].status = StageStatus::Running;
        assert_item_invariants(&run);
    }

    #[test]
    #[should_panic(expected = "disagrees with its stages")]
    fn test_inconsistent_status_detected() {
        let mut run = item_run();
        run.status = ItemStatus::Completed;
        assert_item_invariants(&run);
    }
}
