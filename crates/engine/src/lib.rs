//! Incremental transcription over a batch ASR backend.
//!
//! The engine re-decodes a growing audio window on every iteration, confirms
//! the prefix on which consecutive decodes agree, and trims the window once
//! its front is fully confirmed. An optional voice gate keeps silence out of
//! the window and flushes eagerly at utterance boundaries.

mod buffer;
mod config;
mod gated;
mod hypothesis;
mod online;

pub use buffer::AudioBuffer;
pub use config::{StreamingConfig, TrimPolicy};
pub use gated::{VoiceGateState, VoiceGatedTranscriber};
pub use hypothesis::HypothesisBuffer;
pub use online::{StreamingTranscriber, Transcription};

pub use sotto_asr::{AsrBackend, DecodeOptions, DecodeOutput, Task, Word};

pub(crate) const SAMPLE_RATE: usize = sotto_asr::SAMPLE_RATE as usize;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("decode failed: {0}")]
    Decode(#[from] sotto_asr::AsrError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
