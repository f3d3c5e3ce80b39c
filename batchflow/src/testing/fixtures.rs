//! Test fixtures for pipeline testing.

use std::sync::Arc;

use futures::StreamExt;

use crate::config::EngineConfig;
use crate::core::{RawInput, Snapshot};
use crate::errors::BatchflowError;
use crate::events::{CollectingEventSink, EventSink};
use crate::pipeline::{PipelineBuilder, PipelineEngine};
use crate::stages::{StageCompute, StageDescriptor};

/// Creates `count` image inputs named `cheque-<n>.png`.
#[must_use]
pub fn image_inputs(count: usize) -> Vec<RawInput> {
    (0..count)
        .map(|n| {
            RawInput::new(format!("cheque-{n}.png"), vec![0x89, b'P', b'N', b'G'])
                .with_media_type("image/png")
        })
        .collect()
}

/// Builds engines wired to a collecting event sink.
pub struct TestPipeline {
    builder: PipelineBuilder,
    sink: Arc<CollectingEventSink>,
}

impl std::fmt::Debug for TestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestPipeline")
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

impl Default for TestPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPipeline {
    /// Creates an empty test pipeline.
    #[must_use]
    pub fn new() -> Self {
        let sink = Arc::new(CollectingEventSink::new());
        Self {
            builder: PipelineBuilder::new("test")
                .event_sink(Arc::clone(&sink) as Arc<dyn EventSink>),
            sink,
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, description: &str, compute: impl StageCompute + 'static) -> Self {
        self.builder = self.builder.stage(description, compute);
        self
    }

    /// Appends a stage whose computation the caller keeps a handle to.
    #[must_use]
    pub fn shared_stage(mut self, description: &str, compute: Arc<dyn StageCompute>) -> Self {
        self.builder = self
            .builder
            .add_stage(StageDescriptor::from_arc(description, compute));
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.builder = self.builder.config(config);
        self
    }

    /// Builds the engine and returns it with its event sink.
    ///
    /// # Errors
    ///
    /// Propagates builder validation errors.
    pub fn build(self) -> Result<(PipelineEngine, Arc<CollectingEventSink>), BatchflowError> {
        Ok((self.builder.build()?, self.sink))
    }
}

/// Submits inputs, runs the batch and collects every snapshot.
///
/// # Errors
///
/// Propagates `submit` and `run` errors.
pub async fn collect_snapshots(
    engine: &PipelineEngine,
    inputs: Vec<RawInput>,
) -> Result<Vec<Snapshot>, BatchflowError> {
    let batch = engine.submit(inputs)?;
    let snapshots = engine.run(batch.id)?.collect::<Vec<_>>().await;
    Ok(snapshots)
}
