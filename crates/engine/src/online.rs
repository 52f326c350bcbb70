//! The growing-window streaming engine.
//!
//! Every iteration re-decodes the entire audio window: chunk-local decoding
//! is poor at boundaries, so accuracy comes from repeatedly re-transcribing
//! an expanding context and committing only what consecutive decodes agree
//! on. Once the front of the window is fully confirmed it is trimmed away to
//! bound memory and decode cost.

use std::sync::Arc;

use serde::Serialize;
use sotto_asr::{AsrBackend, DecodeOptions, Word};
use sotto_sentences::SentenceSplitter;

use crate::buffer::AudioBuffer;
use crate::config::{StreamingConfig, TrimPolicy};
use crate::hypothesis::HypothesisBuffer;
use crate::{EngineError, Result};

/// Upper bound on decode-priming prompt length, in characters.
const PROMPT_CHAR_BUDGET: usize = 200;

/// Emergency segment-based trim applied in sentence mode when the splitter
/// keeps failing to find a cut point.
const SENTENCE_MODE_SEGMENT_CAP_MS: u64 = 30_000;

/// Newly confirmed text for one `process_iter` call, absolute timestamps.
/// Empty fields when nothing new was confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcription {
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
    pub text: String,
}

impl Transcription {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub(crate) fn from_words(words: &[Word], separator: &str) -> Self {
        let (Some(first), Some(last)) = (words.first(), words.last()) else {
            return Self::default();
        };
        Self {
            start_ms: Some(first.start_ms),
            end_ms: Some(last.end_ms),
            text: words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(separator),
        }
    }
}

/// End time of a committed sentence, recovered from its last word.
struct TimedSentence {
    end_ms: u64,
}

/// One transcription session over a batch ASR backend.
///
/// Single-threaded by design: the session owns its window exclusively and
/// `process_iter` must not race `insert_audio_chunk`. Sessions share only
/// the backend handle.
pub struct StreamingTranscriber {
    backend: Arc<dyn AsrBackend>,
    splitter: Option<Arc<dyn SentenceSplitter>>,
    config: StreamingConfig,
    audio: AudioBuffer,
    hypothesis: HypothesisBuffer,
    /// Confirmed words over the whole session, absolute time, append-only.
    committed: Vec<Word>,
}

impl std::fmt::Debug for StreamingTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingTranscriber")
            .field("backend", &"<dyn AsrBackend>")
            .field("splitter", &self.splitter.as_ref().map(|_| "<dyn SentenceSplitter>"))
            .field("config", &self.config)
            .field("audio", &self.audio)
            .field("hypothesis", &self.hypothesis)
            .field("committed", &self.committed)
            .finish()
    }
}

impl StreamingTranscriber {
    /// Configuration problems are fatal here; no partial session exists
    /// afterwards.
    pub fn new(
        backend: Arc<dyn AsrBackend>,
        splitter: Option<Arc<dyn SentenceSplitter>>,
        config: StreamingConfig,
    ) -> Result<Self> {
        config.validate()?;
        if config.trim_policy == TrimPolicy::Sentence && splitter.is_none() {
            return Err(EngineError::Config(
                "sentence trimming requires a sentence splitter".into(),
            ));
        }
        Ok(Self {
            backend,
            splitter,
            config,
            audio: AudioBuffer::new(),
            hypothesis: HypothesisBuffer::new(),
            committed: Vec::new(),
        })
    }

    /// Append a chunk of mono 16 kHz samples. Never triggers a decode.
    pub fn insert_audio_chunk(&mut self, samples: &[f32]) {
        self.audio.push(samples);
    }

    /// One engine tick: decode the window, confirm the agreed prefix, trim
    /// if the policy allows, and report the newly confirmed span.
    ///
    /// A backend failure is returned as-is with all state untouched; the
    /// next call retries with the same or a larger window.
    pub fn process_iter(&mut self) -> Result<Transcription> {
        if self.audio.current_duration_ms() < self.config.min_chunk_ms {
            tracing::debug!(
                buffered_ms = self.audio.current_duration_ms(),
                min_chunk_ms = self.config.min_chunk_ms,
                "window below minimum chunk, skipping decode"
            );
            return Ok(Transcription::default());
        }

        let (init_prompt, context) = self.prompt();
        let options = DecodeOptions {
            language: self.config.language.clone(),
            task: self.config.task,
            init_prompt,
        };
        tracing::debug!(
            window_ms = self.audio.current_duration_ms(),
            offset_ms = self.audio.time_offset_ms(),
            context = %context,
            "decoding window"
        );

        let decoded = self.backend.transcribe(self.audio.samples(), &options)?;

        self.hypothesis
            .insert(decoded.words, self.audio.time_offset_ms());
        let confirmed = self.hypothesis.flush();
        self.committed.extend_from_slice(&confirmed);

        if !confirmed.is_empty()
            && self.config.trim_policy == TrimPolicy::Sentence
            && self.audio.current_duration_ms() > self.config.trim_threshold_ms
        {
            self.trim_completed_sentence();
        }

        let segment_cap_ms = match self.config.trim_policy {
            TrimPolicy::Segment => self.config.trim_threshold_ms,
            TrimPolicy::Sentence => SENTENCE_MODE_SEGMENT_CAP_MS,
        };
        if self.audio.current_duration_ms() > segment_cap_ms {
            self.trim_completed_segment(&decoded.segment_ends_ms);
        }

        Ok(Transcription::from_words(
            &confirmed,
            self.backend.separator(),
        ))
    }

    /// Flush the tentative tail as final output: the utterance (or stream)
    /// is over, so no further decode can corroborate or contradict it.
    pub fn finish(&mut self) -> Transcription {
        let tail: Vec<Word> = self.hypothesis.tail().to_vec();
        let flushed = Transcription::from_words(&tail, self.backend.separator());
        if !tail.is_empty() {
            tracing::debug!(words = tail.len(), "flushing tentative tail");
            self.committed.extend(tail);
        }

        let window_end = self.audio.time_offset_ms() + self.audio.current_duration_ms();
        self.audio.drain_with_offset();
        self.hypothesis.rebase(window_end);
        flushed
    }

    /// Drop the window and tentative state and continue at `offset_ms` (the
    /// voice gate re-opening). The committed transcript is retained.
    pub fn rebase(&mut self, offset_ms: u64) {
        self.audio.rebase(offset_ms);
        self.hypothesis.rebase(offset_ms);
    }

    /// Reset the whole session for a new stream.
    pub fn reset(&mut self) {
        self.audio.rebase(0);
        self.hypothesis.rebase(0);
        self.committed.clear();
    }

    /// Tentative trailing text, for display only; the next call may revise
    /// or withdraw it, unlike anything returned by `process_iter`.
    pub fn tentative_text(&self) -> String {
        self.join(self.hypothesis.tail())
    }

    pub fn committed_text(&self) -> String {
        self.join(&self.committed)
    }

    pub fn committed_words(&self) -> &[Word] {
        &self.committed
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn window_duration_ms(&self) -> u64 {
        self.audio.current_duration_ms()
    }

    pub fn time_offset_ms(&self) -> u64 {
        self.audio.time_offset_ms()
    }

    /// Window duration plus everything trimmed away: all audio admitted.
    pub fn total_duration_ms(&self) -> u64 {
        self.audio.total_duration_ms()
    }

    pub(crate) fn separator(&self) -> &str {
        self.backend.separator()
    }

    fn join(&self, words: &[Word]) -> String {
        words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(self.backend.separator())
    }

    /// Decoder priming: up to [`PROMPT_CHAR_BUDGET`] chars of committed text
    /// that has scrolled out of the window (oldest dropped first), plus the
    /// committed text still inside the window, for logging.
    fn prompt(&self) -> (String, String) {
        let offset = self.audio.time_offset_ms();
        let scrolled_out = self.committed.partition_point(|w| w.end_ms <= offset);
        let (scrolled, in_window) = self.committed.split_at(scrolled_out);

        let mut char_budget = 0usize;
        let mut take = 0usize;
        for word in scrolled.iter().rev() {
            if char_budget >= PROMPT_CHAR_BUDGET {
                break;
            }
            char_budget += word.text.chars().count() + 1;
            take += 1;
        }

        (
            self.join(&scrolled[scrolled.len() - take..]),
            self.join(in_window),
        )
    }

    fn trim_at(&mut self, cut_ms: u64) {
        self.hypothesis.pop_committed(cut_ms);
        self.audio.trim_to_ms(cut_ms);
    }

    /// Cut at the end of the last-but-one completed sentence of the
    /// committed text. Best effort: fewer than two sentences means no cut.
    fn trim_completed_sentence(&mut self) {
        if self.committed.is_empty() {
            return;
        }
        let Some(splitter) = self.splitter.clone() else {
            return;
        };
        let sentences = self.words_to_sentences(splitter.as_ref());
        if sentences.len() < 2 {
            tracing::debug!("not enough complete sentences to trim");
            return;
        }
        let cut_ms = sentences[sentences.len() - 2].end_ms;
        tracing::debug!(cut_ms, "trimming at sentence boundary");
        self.trim_at(cut_ms);
    }

    /// Cut at the newest backend segment boundary that is already fully
    /// committed, preferring the last-but-one boundary. Best effort.
    fn trim_completed_segment(&mut self, segment_ends_ms: &[u64]) {
        let Some(last_committed) = self.committed.last() else {
            return;
        };
        if segment_ends_ms.len() <= 1 {
            tracing::debug!("not enough segments to trim");
            return;
        }

        let offset = self.audio.time_offset_ms();
        let committed_end = last_committed.end_ms;
        let mut ends = segment_ends_ms.to_vec();
        let mut cut = ends[ends.len() - 2] + offset;
        while ends.len() > 2 && cut > committed_end {
            ends.pop();
            cut = ends[ends.len() - 2] + offset;
        }

        if cut <= committed_end {
            tracing::debug!(cut_ms = cut, "trimming at segment boundary");
            self.trim_at(cut);
        } else {
            tracing::debug!("newest segment boundary not yet committed");
        }
    }

    /// Map committed words back onto the splitter's sentences by walking
    /// both in lockstep; word and sentence tokenization agreeing on
    /// boundaries is what makes the cut timestamps exact.
    fn words_to_sentences(&self, splitter: &dyn SentenceSplitter) -> Vec<TimedSentence> {
        let text = self.join(&self.committed);
        let mut rest_words = self.committed.as_slice();
        let mut out = Vec::new();

        'sentences: for sentence in splitter.split(&text) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let mut remaining = sentence;
            while let Some((word, tail)) = rest_words.split_first() {
                rest_words = tail;
                let token = word.text.trim();
                if remaining == token {
                    out.push(TimedSentence {
                        end_ms: word.end_ms,
                    });
                    continue 'sentences;
                }
                match remaining.strip_prefix(token) {
                    Some(stripped) => remaining = stripped.trim_start(),
                    None => {
                        // word and sentence tokenization disagree; stop
                        // rather than guess at a cut point
                        tracing::debug!(token, "sentence alignment lost");
                        break 'sentences;
                    }
                }
            }
            break;
        }
        out
    }
}
