mod backend;
mod wav;

pub use backend::{AsrBackend, DecodeOptions, DecodeOutput, Task, Word, SAMPLE_RATE};
pub use wav::load_wav_mono_16k;

#[derive(Debug, thiserror::Error)]
pub enum AsrError {
    #[error("model not loaded")]
    ModelNotLoaded,
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    #[error("audio file error: {0}")]
    AudioFile(String),
}

pub type Result<T> = std::result::Result<T, AsrError>;
