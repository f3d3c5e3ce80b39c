//! Pipeline builder with validation.

use super::PipelineEngine;
use crate::config::EngineConfig;
use crate::errors::BatchflowError;
use crate::events::{EventSink, NoOpEventSink};
use crate::stages::{StageCompute, StageDescriptor};
use std::sync::Arc;

/// Builder for creating validated pipeline engines.
///
/// Stages run in the order they are added; indices are assigned 1..=n.
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageDescriptor>,
    config: EngineConfig,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            config: EngineConfig::default(),
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Appends a stage running `compute`.
    #[must_use]
    pub fn stage(self, description: impl Into<String>, compute: impl StageCompute + 'static) -> Self {
        self.add_stage(StageDescriptor::new(description, compute))
    }

    /// Appends a prepared stage descriptor.
    #[must_use]
    pub fn add_stage(mut self, stage: StageDescriptor) -> Self {
        self.stages.push(stage);
        self
    }

    /// Appends several stage descriptors in order.
    #[must_use]
    pub fn stages(mut self, stages: impl IntoIterator<Item = StageDescriptor>) -> Self {
        self.stages.extend(stages);
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the sink receiving lifecycle events.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPipeline` without stages and `Config` for an invalid
    /// configuration or a blank stage description.
    pub fn build(self) -> Result<PipelineEngine, BatchflowError> {
        if self.stages.is_empty() {
            return Err(BatchflowError::EmptyPipeline);
        }
        self.config.validate()?;
        if let Some(position) = self
            .stages
            .iter()
            .position(|s| s.description.trim().is_empty())
        {
            return Err(BatchflowError::Config(format!(
                "Stage {} has an empty description",
                position + 1
            )));
        }

        Ok(PipelineEngine::from_parts(
            self.name,
            self.stages,
            self.config,
            self.sink,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticCompute;

    fn noop() -> StaticCompute {
        StaticCompute::empty()
    }

    #[test]
    fn test_builder_assigns_indices_in_order() {
        let engine = PipelineBuilder::new("cheques")
            .stage("first", noop())
            .stage("second", noop())
            .stage("third", noop())
            .build()
            .unwrap();

        assert_eq!(engine.name(), "cheques");
        let indices: Vec<usize> = engine.stages().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(engine.stages()[1].description, "second");
    }

    #[test]
    fn test_builder_rejects_empty_pipeline() {
        let result = PipelineBuilder::new("empty").build();
        assert!(matches!(result, Err(BatchflowError::EmptyPipeline)));
    }

    #[test]
    fn test_builder_rejects_blank_description() {
        let result = PipelineBuilder::new("blank")
            .stage("ok", noop())
            .stage("  ", noop())
            .build();
        assert!(matches!(result, Err(BatchflowError::Config(msg)) if msg.contains("Stage 2")));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = PipelineBuilder::new("bad")
            .stage("only", noop())
            .config(EngineConfig::new().with_sequence_width(99))
            .build();
        assert!(matches!(result, Err(BatchflowError::Config(_))));
    }

    #[test]
    fn test_builder_stage_count() {
        let builder = PipelineBuilder::new("count").stage("a", noop());
        assert_eq!(builder.stage_count(), 1);
        assert_eq!(builder.name(), "count");
    }
}
