//! Word timestamps to subtitle cues
//!
//! Words are accumulated greedily into the current cue. A cue is closed
//! right after the word that makes it reach the maximum duration, or after
//! the very last word. A single word is never split, so a word that is
//! longer than the threshold on its own still becomes exactly one cue.

use serde::{Deserialize, Serialize};

/// Default maximum cue duration in milliseconds
pub const DEFAULT_MAX_SEGMENT_MS: u64 = 5_000;

/// A single recognised word with its timing in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: u64,
    pub end: u64,
}

impl Word {
    #[must_use]
    pub fn new(text: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// One timed subtitle entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    /// 1-based position in the cue list
    pub index: u32,
    /// Start time in milliseconds
    pub start_ms: u64,
    /// End time in milliseconds
    pub end_ms: u64,
    pub text: String,
}

impl Cue {
    /// Cue duration in milliseconds, zero for a cue whose end precedes its
    /// start
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Split `words` into cues of roughly `max_segment_ms` each.
///
/// Words are taken in the order given. Out-of-order or overlapping
/// timestamps are not corrected: a word ending before the cue started
/// simply does not trigger the close, and the cue end is clamped so that
/// `start_ms <= end_ms` always holds.
#[must_use]
pub fn segment(words: &[Word], max_segment_ms: u64) -> Vec<Cue> {
    let mut cues = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut segment_start = 0;

    for (i, word) in words.iter().enumerate() {
        if current.is_empty() {
            segment_start = word.start;
        }

        current.push(&word.text);

        let is_last = i + 1 == words.len();
        if word.end.saturating_sub(segment_start) >= max_segment_ms || is_last {
            cues.push(Cue {
                index: u32::try_from(cues.len() + 1).unwrap_or(u32::MAX),
                start_ms: segment_start,
                end_ms: word.end.max(segment_start),
                text: current.join(" "),
            });
            current.clear();
        }
    }

    cues
}

/// [`segment`] with the default 5 second threshold
#[must_use]
pub fn segment_default(words: &[Word]) -> Vec<Cue> {
    segment(words, DEFAULT_MAX_SEGMENT_MS)
}
