//! Voice-activity gating around the streaming engine.
//!
//! The growing-window strategy wastes decode work on silence and sits on
//! the last words of an utterance until the trim policy fires. The gate
//! admits only speech (plus a hangover of trailing silence) to the inner
//! engine and forces a flush as soon as an utterance ends.

use sotto_vad::VoiceActivityDetector;

use crate::online::{StreamingTranscriber, Transcription};
use crate::{Result, SAMPLE_RATE};

/// Speech/silence bookkeeping, mutated only by the gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceGateState {
    pub in_speech: bool,
    /// Consecutive silence observed while the gate is open.
    pub silence_run_ms: u64,
    /// Absolute time of the last open/close transition.
    pub last_transition_ms: u64,
}

/// Wraps a [`StreamingTranscriber`] behind a frame-level speech gate.
///
/// Incoming chunks are re-sliced into fixed-size classification frames
/// independent of the caller's chunk sizes; a partial trailing frame is
/// held until the next chunk completes it.
pub struct VoiceGatedTranscriber {
    inner: StreamingTranscriber,
    vad: Box<dyn VoiceActivityDetector>,
    gate: VoiceGateState,
    /// Residue shorter than one classification frame.
    pending: Vec<f32>,
    /// Absolute sample clock: everything classified so far.
    clock_samples: usize,
    frame_samples: usize,
    /// Samples forwarded to the inner engine since its last decode.
    forwarded_since_decode: usize,
    /// The gate closed; the next iteration must flush the inner engine.
    flush_pending: bool,
    /// Flush result rescued when speech restarted before the caller
    /// drained the previous utterance.
    stashed_flush: Option<Transcription>,
}

impl VoiceGatedTranscriber {
    pub fn new(inner: StreamingTranscriber, vad: Box<dyn VoiceActivityDetector>) -> Self {
        let frame_samples = (inner.config().gate_frame_ms as usize * SAMPLE_RATE) / 1000;
        Self {
            inner,
            vad,
            gate: VoiceGateState::default(),
            pending: Vec::new(),
            clock_samples: 0,
            frame_samples,
            forwarded_since_decode: 0,
            flush_pending: false,
            stashed_flush: None,
        }
    }

    /// Classify the chunk frame by frame and forward only speech (plus
    /// hangover) to the inner engine. Confirmed silence is gated out
    /// entirely: it is counted on the clock but not retained.
    pub fn insert_audio_chunk(&mut self, samples: &[f32]) {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(samples);

        let mut frames = buf.chunks_exact(self.frame_samples);
        for frame in frames.by_ref() {
            self.admit_frame(frame);
        }
        self.pending = frames.remainder().to_vec();
    }

    /// Engine tick. A pending utterance-end flush takes priority over
    /// regular decoding and fires regardless of the trim policy; otherwise
    /// the inner engine runs once enough speech accumulated, and silence
    /// reports an empty result immediately.
    pub fn process_iter(&mut self) -> Result<Transcription> {
        if let Some(rescued) = self.stashed_flush.take() {
            return Ok(rescued);
        }

        if self.flush_pending {
            self.flush_pending = false;
            self.forwarded_since_decode = 0;
            return Ok(self.inner.finish());
        }

        let forwarded_ms = (self.forwarded_since_decode as u64 * 1000) / SAMPLE_RATE as u64;
        if forwarded_ms >= self.inner.config().min_chunk_ms {
            self.forwarded_since_decode = 0;
            return self.inner.process_iter();
        }

        tracing::trace!(in_speech = self.gate.in_speech, "no decode, gate only");
        Ok(Transcription::default())
    }

    /// Flush everything still tentative (end of stream).
    pub fn finish(&mut self) -> Transcription {
        self.flush_pending = false;
        self.forwarded_since_decode = 0;
        let tail = self.inner.finish();

        match self.stashed_flush.take() {
            Some(mut rescued) if !tail.is_empty() => {
                rescued.text.push_str(self.inner.separator());
                rescued.text.push_str(&tail.text);
                rescued.end_ms = tail.end_ms.or(rescued.end_ms);
                rescued
            }
            Some(rescued) => rescued,
            None => tail,
        }
    }

    pub fn tentative_text(&self) -> String {
        self.inner.tentative_text()
    }

    pub fn committed_text(&self) -> String {
        self.inner.committed_text()
    }

    pub fn gate(&self) -> &VoiceGateState {
        &self.gate
    }

    pub fn inner(&self) -> &StreamingTranscriber {
        &self.inner
    }

    /// Reset the whole session for a new stream.
    pub fn reset(&mut self) {
        self.inner.reset();
        self.vad.reset();
        self.gate = VoiceGateState::default();
        self.pending.clear();
        self.clock_samples = 0;
        self.forwarded_since_decode = 0;
        self.flush_pending = false;
        self.stashed_flush = None;
    }

    fn admit_frame(&mut self, frame: &[f32]) {
        let frame_start_ms = (self.clock_samples as u64 * 1000) / SAMPLE_RATE as u64;
        self.clock_samples += frame.len();
        let frame_ms = (frame.len() as u64 * 1000) / SAMPLE_RATE as u64;

        let speech = match self.vad.is_speech(frame) {
            Ok(speech) => speech,
            Err(e) => {
                // fail toward the current state: an open gate stays open
                tracing::warn!(error = %e, "voice activity detection failed, keeping gate state");
                self.gate.in_speech
            }
        };

        if speech {
            if !self.gate.in_speech {
                self.open_gate(frame_start_ms);
            }
            self.gate.silence_run_ms = 0;
            self.forward(frame);
        } else if self.gate.in_speech {
            // hangover: trailing silence is still decoder context
            self.gate.silence_run_ms += frame_ms;
            self.forward(frame);
            if self.gate.silence_run_ms > self.inner.config().hangover_ms {
                self.close_gate(frame_start_ms + frame_ms);
            }
        }
    }

    fn open_gate(&mut self, at_ms: u64) {
        if self.flush_pending {
            // the caller never drained the previous utterance; rescue its
            // flush before the rebase discards the tentative tail
            self.flush_pending = false;
            let flushed = self.inner.finish();
            if !flushed.is_empty() {
                self.stashed_flush = Some(flushed);
            }
        }
        self.gate.in_speech = true;
        self.gate.silence_run_ms = 0;
        self.gate.last_transition_ms = at_ms;
        self.forwarded_since_decode = 0;
        tracing::debug!(at_ms, "gate opened");
        self.inner.rebase(at_ms);
    }

    fn close_gate(&mut self, at_ms: u64) {
        self.gate.in_speech = false;
        self.gate.silence_run_ms = 0;
        self.gate.last_transition_ms = at_ms;
        self.flush_pending = true;
        tracing::debug!(at_ms, "gate closed, flush scheduled");
    }

    fn forward(&mut self, frame: &[f32]) {
        self.inner.insert_audio_chunk(frame);
        self.forwarded_since_decode += frame.len();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sotto_asr::{AsrBackend, DecodeOptions, DecodeOutput};
    use sotto_vad::{VadError, VoiceActivityDetector};

    use super::*;
    use crate::StreamingConfig;

    struct NullBackend;

    impl AsrBackend for NullBackend {
        fn transcribe(
            &self,
            _audio: &[f32],
            _options: &DecodeOptions,
        ) -> sotto_asr::Result<DecodeOutput> {
            Ok(DecodeOutput::default())
        }
    }

    /// Classifies frames from a fixed schedule, then repeats the last entry.
    struct ScriptedVad {
        schedule: Vec<bool>,
        cursor: usize,
    }

    impl ScriptedVad {
        fn new(schedule: Vec<bool>) -> Self {
            Self {
                schedule,
                cursor: 0,
            }
        }
    }

    impl VoiceActivityDetector for ScriptedVad {
        fn is_speech(&mut self, _frame: &[f32]) -> sotto_vad::Result<bool> {
            let value = self
                .schedule
                .get(self.cursor)
                .or(self.schedule.last())
                .copied()
                .unwrap_or(false);
            self.cursor += 1;
            Ok(value)
        }

        fn reset(&mut self) {
            self.cursor = 0;
        }
    }

    struct FailingVad;

    impl VoiceActivityDetector for FailingVad {
        fn is_speech(&mut self, _frame: &[f32]) -> sotto_vad::Result<bool> {
            Err(VadError::InferenceError("scripted failure".into()))
        }

        fn reset(&mut self) {}
    }

    fn gated(vad: Box<dyn VoiceActivityDetector>) -> VoiceGatedTranscriber {
        let config = StreamingConfig {
            gate_frame_ms: 100,
            hangover_ms: 300,
            ..Default::default()
        };
        let inner = StreamingTranscriber::new(Arc::new(NullBackend), None, config).unwrap();
        VoiceGatedTranscriber::new(inner, vad)
    }

    fn frames_of_ms(ms: usize) -> Vec<f32> {
        vec![0.0; ms * SAMPLE_RATE / 1000]
    }

    #[test]
    fn partial_frames_carry_across_chunks() {
        let mut gate = gated(Box::new(ScriptedVad::new(vec![true])));
        // 100ms frames; feed 150ms then 50ms
        gate.insert_audio_chunk(&frames_of_ms(150));
        assert_eq!(gate.pending.len(), 50 * SAMPLE_RATE / 1000);
        gate.insert_audio_chunk(&frames_of_ms(50));
        assert!(gate.pending.is_empty());
        assert_eq!(gate.clock_samples, 200 * SAMPLE_RATE / 1000);
    }

    #[test]
    fn silence_is_gated_out() {
        let mut gate = gated(Box::new(ScriptedVad::new(vec![false])));
        gate.insert_audio_chunk(&frames_of_ms(2000));
        assert!(!gate.gate().in_speech);
        assert_eq!(gate.inner().window_duration_ms(), 0);
    }

    #[test]
    fn speech_opens_gate_at_frame_boundary() {
        // 5 silent frames, then speech
        let mut gate = gated(Box::new(ScriptedVad::new(vec![
            false, false, false, false, false, true,
        ])));
        gate.insert_audio_chunk(&frames_of_ms(1000));
        assert!(gate.gate().in_speech);
        assert_eq!(gate.gate().last_transition_ms, 500);
        assert_eq!(gate.inner().time_offset_ms(), 500);
        assert_eq!(gate.inner().window_duration_ms(), 500);
    }

    #[test]
    fn hangover_closes_gate_and_schedules_flush() {
        // 3 speech frames, then silence
        let mut gate = gated(Box::new(ScriptedVad::new(vec![true, true, true, false])));
        gate.insert_audio_chunk(&frames_of_ms(1000));
        // silence_run passes 300ms hangover on the 4th silent frame
        assert!(!gate.gate().in_speech);
        assert!(gate.flush_pending);
        assert_eq!(gate.gate().last_transition_ms, 700);
    }

    #[test]
    fn vad_failure_keeps_gate_state() {
        let mut gate = gated(Box::new(FailingVad));
        gate.insert_audio_chunk(&frames_of_ms(500));
        // closed gate stays closed on errors
        assert!(!gate.gate().in_speech);
        assert_eq!(gate.inner().window_duration_ms(), 0);
    }
}
