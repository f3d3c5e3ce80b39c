//! Mock stage computations for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

use crate::core::{StageResult, StageStatus};
use crate::errors::StageError;
use crate::stages::{StageCompute, StageInput};

/// A computation that always returns the same result.
#[derive(Debug, Clone, Default)]
pub struct StaticCompute {
    result: StageResult,
}

impl StaticCompute {
    /// Creates a computation returning `result`.
    #[must_use]
    pub fn new(result: StageResult) -> Self {
        Self { result }
    }

    /// Creates a computation returning no lines and no payload.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a computation returning the given console lines.
    #[must_use]
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(StageResult::lines(lines))
    }

    /// Creates a computation returning a structured payload.
    #[must_use]
    pub fn structured(value: serde_json::Value) -> Self {
        Self::new(StageResult::empty().with_structured(value))
    }
}

#[async_trait]
impl StageCompute for StaticCompute {
    async fn compute(&self, _input: StageInput<'_>) -> Result<StageResult, StageError> {
        Ok(self.result.clone())
    }
}

/// A computation that fails, either always or only for chosen labels.
#[derive(Debug, Clone)]
pub struct FailingCompute {
    error: String,
    only_labels: Option<Vec<String>>,
}

impl FailingCompute {
    /// Creates a computation that always fails.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            only_labels: None,
        }
    }

    /// Creates a computation that fails only for items with these labels.
    #[must_use]
    pub fn for_labels<I, S>(error: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            error: error.into(),
            only_labels: Some(labels.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl StageCompute for FailingCompute {
    async fn compute(&self, input: StageInput<'_>) -> Result<StageResult, StageError> {
        let fails = self
            .only_labels
            .as_ref()
            .map_or(true, |labels| labels.iter().any(|l| *l == input.item.label));
        if fails {
            Err(StageError::new(self.error.clone()))
        } else {
            Ok(StageResult::lines([format!("{} passed", input.item.label)]))
        }
    }
}

/// A computation that panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingCompute;

#[async_trait]
impl StageCompute for PanickingCompute {
    async fn compute(&self, _input: StageInput<'_>) -> Result<StageResult, StageError> {
        panic!("Intentional panic")
    }
}

/// A computation that sleeps before succeeding.
#[derive(Debug, Clone)]
pub struct SlowCompute {
    delay: Duration,
}

impl SlowCompute {
    /// Creates a slow computation.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Creates a slow computation with a delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

#[async_trait]
impl StageCompute for SlowCompute {
    async fn compute(&self, _input: StageInput<'_>) -> Result<StageResult, StageError> {
        tokio::time::sleep(self.delay).await;
        Ok(StageResult::lines([format!("slept {}ms", self.delay.as_millis())]))
    }
}

/// A record of one call to a [`RecordingCompute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Label of the item.
    pub label: String,
    /// Sequence tag of the item.
    pub sequence_tag: String,
    /// Indices of the prior stages handed in.
    pub prior_indices: Vec<usize>,
    /// Whether every prior stage was completed.
    pub prior_completed: bool,
}

/// A computation that records every call and echoes the item label.
#[derive(Debug, Default)]
pub struct RecordingCompute {
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingCompute {
    /// Creates a new recording computation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl StageCompute for RecordingCompute {
    async fn compute(&self, input: StageInput<'_>) -> Result<StageResult, StageError> {
        self.calls.lock().push(RecordedCall {
            label: input.item.label.clone(),
            sequence_tag: input.item.sequence_tag.clone(),
            prior_indices: input.prior.iter().map(|s| s.stage_index).collect(),
            prior_completed: input
                .prior
                .iter()
                .all(|s| s.status == StageStatus::Completed),
        });
        Ok(StageResult::lines([input.item.label.clone()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BatchItem, RawInput};

    fn item(label: &str) -> BatchItem {
        BatchItem::from_input(RawInput::named(label), "T0")
    }

    #[tokio::test]
    async fn test_static_compute() {
        let compute = StaticCompute::lines(["a", "b"]);
        let item = item("x");
        let result = compute.compute(StageInput::new(&item, &[])).await.unwrap();
        assert_eq!(result.output_lines, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_failing_compute_for_labels() {
        let compute = FailingCompute::for_labels("blurry", ["bad.png"]);
        let bad = item("bad.png");
        let good = item("good.png");

        let err = compute.compute(StageInput::new(&bad, &[])).await.unwrap_err();
        assert_eq!(err.message, "blurry");
        assert!(compute.compute(StageInput::new(&good, &[])).await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_compute() {
        let compute = RecordingCompute::new();
        let item = item("r.png");
        compute.compute(StageInput::new(&item, &[])).await.unwrap();

        assert_eq!(compute.call_count(), 1);
        assert_eq!(compute.calls()[0].label, "r.png");
        assert!(compute.calls()[0].prior_indices.is_empty());
    }
}
