//! Cheque processing demo pipeline.
//!
//! Five stages producing the console output of the cheque scanner: dataset
//! loading, image preprocessing, region extraction, a mocked AI analysis that
//! draws an amount and spells it out, and result visualization. Values are
//! synthetic; seed the generator for reproducible runs. With a non-zero
//! `failure_rate` the analysis stage rejects that share of cheques.

use crate::core::StageResult;
use crate::errors::{BatchflowError, StageError};
use crate::stages::{StageCompute, StageDescriptor, StageInput};
use crate::words::to_words;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Index of the analysis stage, whose payload later stages read.
pub const ANALYSIS_STAGE: usize = 4;

/// Message of an analysis stage that rejected its cheque.
pub const EXTRACTION_FAILED: &str = "Extraction failed: no amount could be read";

/// Configuration of the demo stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChequeConfig {
    /// Size reported for the reference dataset.
    #[serde(default = "default_dataset_size")]
    pub dataset_size: u32,
    /// Seed for the mock value generator; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Simulated per-stage latency range `[min, max)` in milliseconds.
    #[serde(default)]
    pub latency_ms: Option<(u64, u64)>,
    /// Probability in `[0, 1]` that the analysis stage fails for a cheque.
    #[serde(default)]
    pub failure_rate: f64,
}

fn default_dataset_size() -> u32 {
    5000
}

impl Default for ChequeConfig {
    fn default() -> Self {
        Self {
            dataset_size: default_dataset_size(),
            seed: None,
            latency_ms: None,
            failure_rate: 0.0,
        }
    }
}

impl ChequeConfig {
    /// Creates a configuration with defaults and no simulated latency.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the generator seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the simulated latency range.
    #[must_use]
    pub fn with_latency_ms(mut self, min: u64, max: u64) -> Self {
        self.latency_ms = Some((min, max));
        self
    }

    /// Sets the share of cheques the analysis stage rejects.
    #[must_use]
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate;
        self
    }

    /// Uses the pacing and rejection rate of the interactive scanner:
    /// 1-3 seconds per stage, one cheque in ten rejected.
    #[must_use]
    pub fn interactive() -> Self {
        Self::default()
            .with_latency_ms(1000, 3000)
            .with_failure_rate(0.1)
    }

    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), BatchflowError> {
        if let Some((min, max)) = self.latency_ms {
            if min >= max {
                return Err(BatchflowError::Config(format!(
                    "latency_ms range is empty: [{min}, {max})"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(BatchflowError::Config(format!(
                "failure_rate must be within [0, 1], got {}",
                self.failure_rate
            )));
        }
        Ok(())
    }
}

/// Fields extracted by the analysis stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedAmount {
    /// Amount read from the numerical region.
    pub numerical_value: i64,
    /// Amount read from the textual region.
    pub textual_value: String,
    /// Confidence percentage.
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChequeStep {
    LoadDataset,
    Preprocess,
    ExtractRegions,
    Analyse,
    Visualize,
}

impl ChequeStep {
    const ALL: [Self; 5] = [
        Self::LoadDataset,
        Self::Preprocess,
        Self::ExtractRegions,
        Self::Analyse,
        Self::Visualize,
    ];

    fn description(self) -> &'static str {
        match self {
            Self::LoadDataset => "Loading dataset",
            Self::Preprocess => "Image preprocessing",
            Self::ExtractRegions => "Region extraction",
            Self::Analyse => "AI analysis",
            Self::Visualize => "Result visualization",
        }
    }
}

#[derive(Debug)]
struct Shared {
    config: ChequeConfig,
    rng: Mutex<StdRng>,
}

impl Shared {
    fn latency(&self) -> Option<Duration> {
        let (min, max) = self.config.latency_ms?;
        Some(Duration::from_millis(self.rng.lock().gen_range(min..max)))
    }

    /// Draws the amount and confidence, or `None` for a rejected cheque.
    fn draw_amount(&self) -> Option<(i64, u8)> {
        let mut rng = self.rng.lock();
        let rate = self.config.failure_rate;
        if rate > 0.0 && rng.gen_bool(rate) {
            return None;
        }
        Some((rng.gen_range(1000..11_000), rng.gen_range(80..100)))
    }
}

/// One stage of the cheque pipeline.
#[derive(Debug, Clone)]
pub struct ChequeStage {
    step: ChequeStep,
    shared: Arc<Shared>,
}

#[async_trait]
impl StageCompute for ChequeStage {
    async fn compute(&self, input: StageInput<'_>) -> Result<StageResult, StageError> {
        if let Some(delay) = self.shared.latency() {
            tokio::time::sleep(delay).await;
        }

        match self.step {
            ChequeStep::LoadDataset => Ok(StageResult::lines([
                format!("Dataset loaded: {} cheques", self.shared.config.dataset_size),
                format!("Processing cheque: {}", input.item.sequence_tag),
            ])),
            ChequeStep::Preprocess => Ok(StageResult::lines([
                format!("Loading image: {}", input.item.label),
                "Upscaling resolution: factor 2".to_string(),
                "Converting to grayscale".to_string(),
                "Adaptive thresholding applied".to_string(),
                "Morphological cleanup finished".to_string(),
            ])),
            ChequeStep::ExtractRegions => Ok(StageResult::lines([
                "Contour detection: 247 contours found",
                "Text region filtering: 12 valid regions",
                "Sorting regions by vertical position",
            ])),
            ChequeStep::Analyse => self.analyse(),
            ChequeStep::Visualize => visualize(input),
        }
    }
}

impl ChequeStage {
    fn analyse(&self) -> Result<StageResult, StageError> {
        let (numerical_value, confidence) = self
            .shared
            .draw_amount()
            .ok_or_else(|| StageError::new(EXTRACTION_FAILED))?;
        let extracted = ExtractedAmount {
            numerical_value,
            textual_value: to_words(numerical_value)?,
            confidence,
        };

        StageResult::lines([
            "Analysing numerical region...".to_string(),
            format!("Expected numerical value: {}", extracted.numerical_value),
            "Analysing textual region...".to_string(),
            format!("Expected textual value: {}", extracted.textual_value),
            format!("Confidence: {}%", extracted.confidence),
        ])
        .with_serialized(&extracted)
    }
}

fn visualize(input: StageInput<'_>) -> Result<StageResult, StageError> {
    // The figure is drawn from the analysed regions.
    extracted_amount(input)?;
    Ok(StageResult::lines([
        "Generating visualizations...",
        "Figure created: 2x2 subplots",
        "- Original cheque",
        "- Processed image (thresholded)",
        "- Numerical amount region",
        "- Textual amount region",
        "Regions extracted successfully. Ready for AI analysis.",
    ]))
}

/// Reads the analysis payload from the prior stage runs.
pub fn extracted_amount(input: StageInput<'_>) -> Result<ExtractedAmount, StageError> {
    let value = input
        .structured(ANALYSIS_STAGE)
        .ok_or_else(|| StageError::new("No analysis result available for visualization"))?;
    Ok(serde_json::from_value(value.clone())?)
}

/// Builds the five cheque stages in execution order.
///
/// # Errors
///
/// Returns `Config` for an invalid latency range or failure rate.
pub fn stages(config: ChequeConfig) -> Result<Vec<StageDescriptor>, BatchflowError> {
    config.validate()?;
    let rng = config
        .seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let shared = Arc::new(Shared {
        config,
        rng: Mutex::new(rng),
    });

    Ok(ChequeStep::ALL
        .into_iter()
        .map(|step| {
            StageDescriptor::new(
                step.description(),
                ChequeStage {
                    step,
                    shared: Arc::clone(&shared),
                },
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BatchItem, RawInput, StageRun, StageStatus};
    use pretty_assertions::assert_eq;

    fn item() -> BatchItem {
        BatchItem::from_input(RawInput::named("front.jpg"), "CHQ3000")
    }

    async fn run_all(stages: &[StageDescriptor], item: &BatchItem) -> Vec<StageRun> {
        let mut runs: Vec<StageRun> = Vec::new();
        for (position, stage) in stages.iter().enumerate() {
            let result = stage
                .compute
                .compute(StageInput::new(item, &runs))
                .await
                .unwrap();
            let mut run = StageRun::pending(position + 1, stage.description.clone());
            run.status = StageStatus::Completed;
            run.output_lines = result.output_lines;
            run.structured_output = result.structured_output;
            runs.push(run);
        }
        runs
    }

    #[test]
    fn test_stage_descriptions() {
        let stages = stages(ChequeConfig::new()).unwrap();
        let descriptions: Vec<&str> = stages.iter().map(|s| s.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec![
                "Loading dataset",
                "Image preprocessing",
                "Region extraction",
                "AI analysis",
                "Result visualization",
            ]
        );
    }

    #[tokio::test]
    async fn test_console_lines() {
        let stages = stages(ChequeConfig::new().with_seed(1)).unwrap();
        let item = item();
        let runs = run_all(&stages, &item).await;

        assert_eq!(
            runs[0].output_lines,
            vec!["Dataset loaded: 5000 cheques", "Processing cheque: CHQ3000"]
        );
        assert_eq!(runs[1].output_lines[0], "Loading image: front.jpg");
        assert_eq!(runs[2].output_lines.len(), 3);
        assert_eq!(runs[4].output_lines.len(), 7);
        assert!(runs[4].structured_output.is_none());
    }

    #[tokio::test]
    async fn test_analysis_spells_amount() {
        let stages = stages(ChequeConfig::new().with_seed(42)).unwrap();
        let item = item();
        let runs = run_all(&stages, &item).await;

        let extracted: ExtractedAmount =
            serde_json::from_value(runs[3].structured_output.clone().unwrap()).unwrap();
        assert!((1000..11_000).contains(&extracted.numerical_value));
        assert!((80..100).contains(&extracted.confidence));
        assert_eq!(extracted.textual_value, to_words(extracted.numerical_value).unwrap());
        assert_eq!(
            runs[3].output_lines[3],
            format!("Expected textual value: {}", extracted.textual_value)
        );
        assert_eq!(
            runs[4].output_lines[6],
            "Regions extracted successfully. Ready for AI analysis."
        );
    }

    #[tokio::test]
    async fn test_seeded_runs_are_deterministic() {
        let item = item();
        let first = run_all(&stages(ChequeConfig::new().with_seed(7)).unwrap(), &item).await;
        let second = run_all(&stages(ChequeConfig::new().with_seed(7)).unwrap(), &item).await;
        assert_eq!(first[3].structured_output, second[3].structured_output);
    }

    #[tokio::test]
    async fn test_visualize_requires_analysis() {
        let stages = stages(ChequeConfig::new()).unwrap();
        let item = item();
        let err = stages[4]
            .compute
            .compute(StageInput::new(&item, &[]))
            .await
            .unwrap_err();
        assert!(err.message.contains("No analysis result"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = stages(ChequeConfig::new().with_latency_ms(500, 500));
        assert!(matches!(result, Err(BatchflowError::Config(_))));
        let result = stages(ChequeConfig::new().with_failure_rate(1.5));
        assert!(matches!(result, Err(BatchflowError::Config(_))));

        let interactive = ChequeConfig::interactive();
        assert_eq!(interactive.latency_ms, Some((1000, 3000)));
        assert!((interactive.failure_rate - 0.1).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_analysis_rejects_cheque() {
        let stages = stages(ChequeConfig::new().with_seed(5).with_failure_rate(1.0)).unwrap();
        let item = item();
        let err = stages[3]
            .compute
            .compute(StageInput::new(&item, &[]))
            .await
            .unwrap_err();
        assert_eq!(err.message, EXTRACTION_FAILED);
    }

    #[test]
    fn test_failure_rate_defaults_to_zero() {
        let config: ChequeConfig = serde_json::from_str(r#"{"seed": 9}"#).unwrap();
        assert!(config.failure_rate.abs() < f64::EPSILON);
        assert_eq!(config.dataset_size, 5000);
    }
}
