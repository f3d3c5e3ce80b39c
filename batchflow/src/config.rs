//! Engine configuration.

use crate::errors::BatchflowError;
use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::pipeline::PipelineEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Prefix of each item's sequence tag.
    #[serde(default = "default_sequence_prefix")]
    pub sequence_prefix: String,
    /// Number assigned to the first item of a batch.
    #[serde(default = "default_sequence_start")]
    pub sequence_start: u64,
    /// Minimum digit count of the sequence number (zero padded).
    #[serde(default = "default_sequence_width")]
    pub sequence_width: usize,
    /// Whether lifecycle events are sent to the event sink.
    #[serde(default = "default_emit_events")]
    pub emit_events: bool,
}

fn default_sequence_prefix() -> String {
    "CHQ".to_string()
}

fn default_sequence_start() -> u64 {
    3000
}

fn default_sequence_width() -> usize {
    4
}

fn default_emit_events() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sequence_prefix: default_sequence_prefix(),
            sequence_start: default_sequence_start(),
            sequence_width: default_sequence_width(),
            emit_events: default_emit_events(),
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON; missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` for malformed JSON and `Config` for values
    /// that fail validation.
    pub fn from_json(json: &str) -> Result<Self, BatchflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the sequence tag prefix.
    #[must_use]
    pub fn with_sequence_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sequence_prefix = prefix.into();
        self
    }

    /// Sets the first sequence number.
    #[must_use]
    pub fn with_sequence_start(mut self, start: u64) -> Self {
        self.sequence_start = start;
        self
    }

    /// Sets the zero-padding width.
    #[must_use]
    pub fn with_sequence_width(mut self, width: usize) -> Self {
        self.sequence_width = width;
        self
    }

    /// Enables or disables lifecycle events.
    #[must_use]
    pub fn with_events(mut self, enabled: bool) -> Self {
        self.emit_events = enabled;
        self
    }

    /// Checks the configuration for values the engine cannot use.
    pub fn validate(&self) -> Result<(), BatchflowError> {
        if self.sequence_width > 20 {
            return Err(BatchflowError::Config(format!(
                "sequence_width must be at most 20, got {}",
                self.sequence_width
            )));
        }
        if self.sequence_prefix.chars().any(char::is_whitespace) {
            return Err(BatchflowError::Config(
                "sequence_prefix must not contain whitespace".to_string(),
            ));
        }
        Ok(())
    }

    /// Formats the sequence tag of the item at a 0-based batch position.
    #[must_use]
    pub fn sequence_tag(&self, position: usize) -> String {
        let number = self.sequence_start.saturating_add(position as u64);
        format!(
            "{}{:0width$}",
            self.sequence_prefix,
            number,
            width = self.sequence_width
        )
    }
}
