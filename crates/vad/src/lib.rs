use std::time::Duration;

use silero::{VadConfig, VadSession, VadTransition};

#[derive(Debug, thiserror::Error)]
pub enum VadError {
    #[error("session creation failed")]
    SessionCreationFailed,
    #[error("inference error: {0}")]
    InferenceError(String),
}

pub type Result<T> = std::result::Result<T, VadError>;

/// Frame-level speech classification.
///
/// Callers feed fixed-size frames of mono 16 kHz samples in stream order;
/// implementations may keep state across frames (smoothing, hangover).
pub trait VoiceActivityDetector: Send + Sync {
    fn is_speech(&mut self, frame: &[f32]) -> Result<bool>;

    /// Drop internal state when a new stream begins.
    fn reset(&mut self);
}

/// Silero neural VAD behind the frame-level interface.
///
/// The session's own transitions drive a speaking flag; a frame is reported
/// as speech while the session considers the stream inside a speech run
/// (including Silero's internal redemption padding).
pub struct SileroVad {
    session: VadSession,
    speaking: bool,
}

impl SileroVad {
    pub fn new(sample_rate: u32) -> Result<Self> {
        let config = VadConfig {
            sample_rate: sample_rate as usize,
            // Redemption time: how long silence before speech ends
            redemption_time: Duration::from_millis(500),
            // Padding before speech start
            pre_speech_pad: Duration::from_millis(200),
            // Padding after speech end
            post_speech_pad: Duration::from_millis(200),
            // Minimum speech duration
            min_speech_time: Duration::from_millis(100),
            ..Default::default()
        };

        Self::with_config(config)
    }

    pub fn with_config(config: VadConfig) -> Result<Self> {
        let session = VadSession::new(config).map_err(|_| VadError::SessionCreationFailed)?;
        Ok(Self {
            session,
            speaking: false,
        })
    }
}

impl VoiceActivityDetector for SileroVad {
    fn is_speech(&mut self, frame: &[f32]) -> Result<bool> {
        let transitions = self
            .session
            .process(frame)
            .map_err(|e| VadError::InferenceError(e.to_string()))?;

        for transition in transitions {
            match transition {
                VadTransition::SpeechStart { .. } => {
                    tracing::debug!("speech started");
                    self.speaking = true;
                }
                VadTransition::SpeechEnd { .. } => {
                    tracing::debug!("speech ended");
                    self.speaking = false;
                }
            }
        }

        Ok(self.speaking)
    }

    fn reset(&mut self) {
        self.session.reset();
        self.speaking = false;
    }
}

/// Model-free fallback: RMS energy against a fixed threshold.
///
/// Far coarser than the neural detector, but keeps the voice gate usable
/// when no model is available.
pub struct EnergyVad {
    threshold: f32,
}

impl EnergyVad {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn is_speech(&mut self, frame: &[f32]) -> Result<bool> {
        if frame.is_empty() {
            return Ok(false);
        }
        let mean_square = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
        Ok(mean_square.sqrt() >= self.threshold)
    }

    fn reset(&mut self) {}
}
