use serde::{Deserialize, Serialize};
use sotto_asr::Task;

use crate::EngineError;

/// Buffer trimming strategy.
///
/// `Segment` cuts at the ASR backend's own segment boundaries; `Sentence`
/// cuts at completed sentences found by the sentence splitter and requires
/// one to be provided at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimPolicy {
    #[default]
    Segment,
    Sentence,
}

/// Session configuration. One value per session, passed to constructors;
/// the engine keeps no process-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Source language code, or `None` for auto-detection.
    pub language: Option<String>,
    pub task: Task,
    /// Minimum buffered audio before a decode is attempted.
    pub min_chunk_ms: u64,
    pub trim_policy: TrimPolicy,
    /// Window length beyond which trimming is attempted.
    pub trim_threshold_ms: u64,
    /// Frame size the voice gate classifies at. Independent of caller
    /// chunk sizes.
    pub gate_frame_ms: u64,
    /// Trailing silence admitted before the gate closes and flushes.
    pub hangover_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            language: None,
            task: Task::Transcribe,
            min_chunk_ms: 1000,
            trim_policy: TrimPolicy::Segment,
            trim_threshold_ms: 15_000,
            gate_frame_ms: 32,
            hangover_ms: 500,
        }
    }
}

impl StreamingConfig {
    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.min_chunk_ms == 0 {
            return Err(EngineError::Config("min_chunk_ms must be positive".into()));
        }
        if self.trim_threshold_ms == 0 {
            return Err(EngineError::Config(
                "trim_threshold_ms must be positive".into(),
            ));
        }
        if self.gate_frame_ms == 0 {
            return Err(EngineError::Config("gate_frame_ms must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(StreamingConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_min_chunk_is_rejected() {
        let config = StreamingConfig {
            min_chunk_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = StreamingConfig {
            language: Some("de".into()),
            trim_policy: TrimPolicy::Sentence,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: StreamingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
