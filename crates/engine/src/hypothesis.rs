//! Local-agreement hypothesis confirmation.
//!
//! Two consecutive decodes of overlapping audio windows are reconciled into
//! the prefix both agree on (committed exactly once, never revised) and a
//! tentative tail that the next decode may still rewrite.

use sotto_asr::Word;

/// Words starting this close before the committed frontier are still
/// admitted; decoders jitter start timestamps slightly between passes.
const COMMIT_BACKTRACK_MS: u64 = 100;

/// When a decode begins within this distance of the frontier, its head is
/// checked for a re-decoded copy of already-committed words.
const OVERLAP_WINDOW_MS: u64 = 1000;

/// Longest repeated n-gram removed by overlap dedup.
const MAX_OVERLAP_NGRAM: usize = 5;

/// Reconciles consecutive overlapping decodes into confirmed words and a
/// tentative tail. All words inside carry absolute timestamps.
#[derive(Debug, Default)]
pub struct HypothesisBuffer {
    /// Committed words still covered by the audio window.
    committed_in_window: Vec<Word>,
    /// Tentative tail of the previous decode.
    buffer: Vec<Word>,
    /// The decode currently being reconciled.
    next: Vec<Word>,
    /// End time of the newest committed word.
    last_committed_ms: u64,
}

impl HypothesisBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a fresh decode of the window. `offset_ms` converts the decode's
    /// window-relative timestamps to absolute time.
    pub fn insert(&mut self, new_words: Vec<Word>, offset_ms: u64) {
        let frontier = self.last_committed_ms;
        self.next = new_words
            .into_iter()
            .map(|w| Word {
                text: w.text,
                start_ms: w.start_ms + offset_ms,
                end_ms: w.end_ms + offset_ms,
            })
            .filter(|w| w.start_ms + COMMIT_BACKTRACK_MS > frontier)
            .collect();

        if let Some(first) = self.next.first() {
            if first.start_ms.abs_diff(self.last_committed_ms) < OVERLAP_WINDOW_MS
                && !self.committed_in_window.is_empty()
            {
                self.drop_repeated_prefix();
            }
        }
    }

    /// Drop a 1..=5-word prefix of the new decode that exactly repeats the
    /// tail of the committed words: the decoder re-transcribed audio the
    /// engine has already emitted.
    fn drop_repeated_prefix(&mut self) {
        let committed = self.committed_in_window.len();
        let longest = committed.min(self.next.len()).min(MAX_OVERLAP_NGRAM);
        for n in 1..=longest {
            let tail = self.committed_in_window[committed - n..]
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let head = self.next[..n]
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            if tail == head {
                let dropped: Vec<Word> = self.next.drain(..n).collect();
                tracing::debug!(
                    count = n,
                    words = ?dropped.iter().map(|w| w.text.as_str()).collect::<Vec<_>>(),
                    "dropped re-decoded overlap"
                );
                break;
            }
        }
    }

    /// Promote the prefix on which the previous and current decode agree.
    ///
    /// The first call after construction confirms nothing: there is no
    /// previous decode to agree with. A disjoint new decode confirms
    /// nothing and replaces the tentative tail wholesale.
    pub fn flush(&mut self) -> Vec<Word> {
        let agreed = self
            .next
            .iter()
            .zip(self.buffer.iter())
            .take_while(|(n, b)| n.text == b.text)
            .count();

        let confirmed: Vec<Word> = self.next.drain(..agreed).collect();
        if let Some(last) = confirmed.last() {
            self.last_committed_ms = last.end_ms;
        }

        self.buffer = std::mem::take(&mut self.next);
        self.committed_in_window.extend_from_slice(&confirmed);

        tracing::debug!(
            confirmed = confirmed.len(),
            tentative = self.buffer.len(),
            frontier_ms = self.last_committed_ms,
            "hypothesis flush"
        );
        confirmed
    }

    /// Forget committed words that ended at or before a trim point; they
    /// left the audio window and can no longer be re-decoded.
    pub fn pop_committed(&mut self, up_to_ms: u64) {
        self.committed_in_window.retain(|w| w.end_ms > up_to_ms);
    }

    /// Still-tentative trailing words; may be revised by the next decode.
    pub fn tail(&self) -> &[Word] {
        &self.buffer
    }

    /// Clear everything and pin the committed frontier to `offset_ms`.
    pub(crate) fn rebase(&mut self, offset_ms: u64) {
        self.committed_in_window.clear();
        self.buffer.clear();
        self.next.clear();
        self.last_committed_ms = offset_ms;
    }
}
