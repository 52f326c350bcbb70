use serde::{Deserialize, Serialize};

/// Standard sample rate for all engine audio (mono PCM).
pub const SAMPLE_RATE: u32 = 16000;

/// A decoded word with timing information, relative to the start of the
/// audio window it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Word {
    pub fn new(text: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            text: text.into(),
            start_ms,
            end_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    #[default]
    Transcribe,
    Translate,
}

/// Per-decode parameters handed to the backend.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Source language code (e.g. "en", "de"), or `None` for auto-detection.
    pub language: Option<String>,
    pub task: Task,
    /// Committed text that has already scrolled out of the audio window.
    /// Backends that support decoder priming use it as preceding context.
    pub init_prompt: String,
}

/// One full decode of an audio window.
#[derive(Debug, Clone, Default)]
pub struct DecodeOutput {
    /// Word-level hypothesis, in order, window-relative timestamps.
    pub words: Vec<Word>,
    /// End timestamps of the backend's own segments, window-relative.
    /// May be empty for backends without segmentation.
    pub segment_ends_ms: Vec<u64>,
}

/// Batch speech recognition capability.
///
/// Implementations must tolerate being called repeatedly on growing prefixes
/// of the same audio: outputs for a longer window should extend, not
/// contradict, outputs for a shorter one, or downstream hypothesis agreement
/// will never converge. Shared across sessions behind an `Arc`, so inference
/// must either be safe for concurrent calls or serialize internally.
pub trait AsrBackend: Send + Sync {
    /// Decode an entire audio window (mono f32 at [`SAMPLE_RATE`]).
    fn transcribe(&self, audio: &[f32], options: &DecodeOptions) -> crate::Result<DecodeOutput>;

    /// Join string between consecutive words of this backend's output.
    fn separator(&self) -> &str {
        " "
    }
}
