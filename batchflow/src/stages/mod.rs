//! Stage descriptors and the computations they run.
//!
//! A stage is a labelled [`StageCompute`] at a fixed position in the
//! pipeline. Every item of a batch runs the same ordered stage list.

use crate::core::{BatchItem, StageResult, StageRun};
use crate::errors::StageError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

/// What a computation sees when it runs.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    /// The item being processed.
    pub item: &'a BatchItem,
    /// Runs of every earlier stage of this item, all completed, in order.
    pub prior: &'a [StageRun],
}

impl<'a> StageInput<'a> {
    /// Creates a new stage input.
    #[must_use]
    pub fn new(item: &'a BatchItem, prior: &'a [StageRun]) -> Self {
        Self { item, prior }
    }

    /// Returns the run of an earlier stage by its 1-based index.
    #[must_use]
    pub fn prior_stage(&self, index: usize) -> Option<&'a StageRun> {
        self.prior.iter().find(|s| s.stage_index == index)
    }

    /// Returns the structured output of an earlier stage.
    #[must_use]
    pub fn structured(&self, index: usize) -> Option<&'a serde_json::Value> {
        self.prior_stage(index)
            .and_then(|s| s.structured_output.as_ref())
    }

    /// Returns the structured output of the immediately preceding stage.
    #[must_use]
    pub fn previous_structured(&self) -> Option<&'a serde_json::Value> {
        self.prior.last().and_then(|s| s.structured_output.as_ref())
    }
}

/// Trait for stage computations.
///
/// Implementations may suspend for as long as they like; the engine never
/// runs two computations of the same batch at once.
#[async_trait]
pub trait StageCompute: Send + Sync + Debug {
    /// Runs the computation for one item.
    async fn compute(&self, input: StageInput<'_>) -> Result<StageResult, StageError>;
}

/// A stage in the pipeline: position, label and computation.
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    /// 1-based position; assigned by the engine from declaration order.
    pub index: usize,
    /// Human-readable label.
    pub description: String,
    /// The computation.
    pub compute: Arc<dyn StageCompute>,
}

impl StageDescriptor {
    /// Creates a descriptor. The index is fixed when the engine is built.
    pub fn new(description: impl Into<String>, compute: impl StageCompute + 'static) -> Self {
        Self {
            index: 0,
            description: description.into(),
            compute: Arc::new(compute),
        }
    }

    /// Creates a descriptor from a shared computation.
    pub fn from_arc(description: impl Into<String>, compute: Arc<dyn StageCompute>) -> Self {
        Self {
            index: 0,
            description: description.into(),
            compute,
        }
    }
}

/// A synchronous function-based computation.
pub struct FnCompute<F>
where
    F: Fn(StageInput<'_>) -> Result<StageResult, StageError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnCompute<F>
where
    F: Fn(StageInput<'_>) -> Result<StageResult, StageError> + Send + Sync,
{
    /// Creates a new function-based computation.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnCompute<F>
where
    F: Fn(StageInput<'_>) -> Result<StageResult, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCompute").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> StageCompute for FnCompute<F>
where
    F: Fn(StageInput<'_>) -> Result<StageResult, StageError> + Send + Sync,
{
    async fn compute(&self, input: StageInput<'_>) -> Result<StageResult, StageError> {
        (self.func)(input)
    }
}

/// An async function-based computation.
///
/// The function receives owned copies of the item and prior runs so the
/// returned future can be `'static`.
pub struct AsyncFnCompute<F, Fut>
where
    F: Fn(BatchItem, Vec<StageRun>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageResult, StageError>> + Send,
{
    name: String,
    func: F,
    _phantom: std::marker::PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnCompute<F, Fut>
where
    F: Fn(BatchItem, Vec<StageRun>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageResult, StageError>> + Send,
{
    /// Creates a new async function-based computation.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<F, Fut> Debug for AsyncFnCompute<F, Fut>
where
    F: Fn(BatchItem, Vec<StageRun>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageResult, StageError>> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnCompute")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F, Fut> StageCompute for AsyncFnCompute<F, Fut>
where
    F: Fn(BatchItem, Vec<StageRun>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageResult, StageError>> + Send,
{
    async fn compute(&self, input: StageInput<'_>) -> Result<StageResult, StageError> {
        (self.func)(input.item.clone(), input.prior.to_vec()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RawInput, StageStatus};

    fn item() -> BatchItem {
        BatchItem::from_input(RawInput::named("cheque.png"), "CHQ3000")
    }

    #[tokio::test]
    async fn test_fn_compute() {
        let compute = FnCompute::new("echo", |input: StageInput<'_>| {
            Ok(StageResult::lines([format!("label: {}", input.item.label)]))
        });

        let item = item();
        let result = compute.compute(StageInput::new(&item, &[])).await.unwrap();
        assert_eq!(result.output_lines, vec!["label: cheque.png"]);
    }

    #[tokio::test]
    async fn test_async_fn_compute() {
        let compute = AsyncFnCompute::new("count", |_item, prior: Vec<StageRun>| async move {
            Ok(StageResult::lines([format!("{} prior", prior.len())]))
        });

        let item = item();
        let mut done = StageRun::pending(1, "first");
        done.status = StageStatus::Completed;
        let prior = vec![done];

        let result = compute.compute(StageInput::new(&item, &prior)).await.unwrap();
        assert_eq!(result.output_lines, vec!["1 prior"]);
    }

    #[test]
    fn test_stage_input_lookup() {
        let item = item();
        let mut first = StageRun::pending(1, "first");
        first.structured_output = Some(serde_json::json!({"value": 3}));
        let second = StageRun::pending(2, "second");
        let prior = vec![first, second];

        let input = StageInput::new(&item, &prior);
        assert_eq!(input.structured(1), Some(&serde_json::json!({"value": 3})));
        assert!(input.structured(2).is_none());
        assert!(input.previous_structured().is_none());
        assert!(input.prior_stage(3).is_none());
    }

    #[test]
    fn test_descriptor_debug() {
        let descriptor = StageDescriptor::new(
            "Loading dataset",
            FnCompute::new("noop", |_input: StageInput<'_>| Ok(StageResult::empty())),
        );
        assert_eq!(descriptor.index, 0);
        assert!(format!("{descriptor:?}").contains("Loading dataset"));
    }
}
