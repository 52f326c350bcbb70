//! The audio window behind the growing-buffer re-decode strategy.
//!
//! Cursor-based front truncation: a trim is an O(1) cursor move, and memory
//! is reclaimed once the dead prefix passes a threshold. The window has no
//! upper size bound; when trimming stalls it keeps growing.

use crate::SAMPLE_RATE;

/// Dead prefix size (samples) that triggers physical compaction.
const COMPACT_THRESHOLD: usize = 16000;

/// Audio window plus the global time offset of its first sample.
///
/// The offset advances only when audio is discarded from the front and
/// always equals the duration of everything discarded so far, keeping
/// window-relative decode timestamps convertible to absolute time.
#[derive(Debug, Default)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    /// Logical start of valid data.
    start_cursor: usize,
    /// Total samples discarded from the front.
    trimmed_samples_total: usize,
    /// Absolute time of the first valid sample.
    time_offset_ms: u64,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    /// The current window, for decoding.
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples[self.start_cursor..]
    }

    #[inline]
    fn logical_len(&self) -> usize {
        self.samples.len() - self.start_cursor
    }

    pub fn current_duration_ms(&self) -> u64 {
        (self.logical_len() as u64 * 1000) / SAMPLE_RATE as u64
    }

    /// Duration of all audio ever admitted: window plus discarded front.
    pub fn total_duration_ms(&self) -> u64 {
        let total_samples = self.logical_len() + self.trimmed_samples_total;
        (total_samples as u64 * 1000) / SAMPLE_RATE as u64
    }

    pub fn time_offset_ms(&self) -> u64 {
        self.time_offset_ms
    }

    /// Discard the front of the window up to an absolute timestamp.
    /// Returns the number of samples discarded; a cut point outside the
    /// window discards nothing.
    pub fn trim_to_ms(&mut self, trim_to_ms: u64) -> usize {
        let rel_ms = trim_to_ms.saturating_sub(self.time_offset_ms);
        let trim_samples = (rel_ms as usize * SAMPLE_RATE) / 1000;

        if trim_samples == 0 || trim_samples > self.logical_len() {
            return 0;
        }

        self.start_cursor += trim_samples;
        self.trimmed_samples_total += trim_samples;
        self.time_offset_ms = trim_to_ms;

        if self.start_cursor >= COMPACT_THRESHOLD {
            self.compact();
        }

        trim_samples
    }

    /// Discard the whole window, advancing the offset past it (end of
    /// utterance: the audio is spent but the clock keeps running).
    pub fn drain_with_offset(&mut self) {
        self.time_offset_ms += self.current_duration_ms();
        self.trimmed_samples_total += self.logical_len();
        self.samples.clear();
        self.start_cursor = 0;
    }

    /// Empty the window and pin its start to an absolute timestamp (the
    /// voice gate re-opening after a silence gap).
    pub fn rebase(&mut self, offset_ms: u64) {
        self.samples.clear();
        self.start_cursor = 0;
        self.time_offset_ms = offset_ms;
        self.trimmed_samples_total = (offset_ms as usize * SAMPLE_RATE) / 1000;
    }

    fn compact(&mut self) {
        if self.start_cursor > 0 {
            self.samples.drain(0..self.start_cursor);
            self.start_cursor = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_read_back() {
        let mut buffer = AudioBuffer::new();
        buffer.push(&[1.0, 2.0, 3.0]);
        assert_eq!(buffer.samples(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn duration_calculation() {
        let mut buffer = AudioBuffer::new();
        buffer.push(&vec![0.0; 16000]); // 1 second at 16kHz
        assert_eq!(buffer.current_duration_ms(), 1000);
        assert_eq!(buffer.total_duration_ms(), 1000);
    }

    #[test]
    fn trim_updates_offset_and_keeps_total() {
        let mut buffer = AudioBuffer::new();
        buffer.push(&vec![0.0; 32000]); // 2 seconds

        let cut = buffer.trim_to_ms(1000);

        assert_eq!(cut, 16000);
        assert_eq!(buffer.time_offset_ms(), 1000);
        assert_eq!(buffer.current_duration_ms(), 1000);
        assert_eq!(buffer.total_duration_ms(), 2000);
    }

    #[test]
    fn trim_beyond_window_is_refused() {
        let mut buffer = AudioBuffer::new();
        buffer.push(&vec![0.0; 16000]);

        assert_eq!(buffer.trim_to_ms(5000), 0);
        assert_eq!(buffer.time_offset_ms(), 0);
        assert_eq!(buffer.current_duration_ms(), 1000);
    }

    #[test]
    fn trim_compacts_after_threshold() {
        let mut buffer = AudioBuffer::new();
        buffer.push(&vec![0.0; 48000]); // 3 seconds

        buffer.trim_to_ms(2000); // 32000 samples, past the compact threshold

        assert_eq!(buffer.samples().len(), 16000);
        assert_eq!(buffer.time_offset_ms(), 2000);
        assert_eq!(buffer.total_duration_ms(), 3000);
    }

    #[test]
    fn drain_preserves_total_duration() {
        let mut buffer = AudioBuffer::new();
        buffer.push(&vec![0.0; 16000]);

        buffer.drain_with_offset();

        assert!(buffer.samples().is_empty());
        assert_eq!(buffer.time_offset_ms(), 1000);
        assert_eq!(buffer.total_duration_ms(), 1000);
    }

    #[test]
    fn rebase_pins_offset() {
        let mut buffer = AudioBuffer::new();
        buffer.push(&vec![0.0; 16000]);

        buffer.rebase(5000);

        assert!(buffer.samples().is_empty());
        assert_eq!(buffer.time_offset_ms(), 5000);
        assert_eq!(buffer.total_duration_ms(), 5000);

        buffer.push(&vec![0.0; 8000]);
        assert_eq!(buffer.current_duration_ms(), 500);
        assert_eq!(buffer.total_duration_ms(), 5500);
    }

    #[test]
    fn grows_without_bound_when_trim_stalls() {
        // No hard cap: if no cut point is ever found the window keeps
        // growing; rising latency is accepted over losing audio.
        let mut buffer = AudioBuffer::new();
        for _ in 0..100 {
            buffer.push(&vec![0.0; 16000]);
        }
        assert_eq!(buffer.current_duration_ms(), 100_000);
    }
}
