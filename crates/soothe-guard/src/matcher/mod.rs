//! Detection stages of the safety pipeline.
//!
//! Three independent, read-only matchers scan the same text:
//!
//! 1. [`PhraseMatcher`] - case-insensitive substring matching of known
//!    harmful phrases.
//! 2. [`PatternMatcher`] - pre-compiled regular expressions for phrasing
//!    that cannot be enumerated as fixed phrases.
//! 3. [`ContextAnalyzer`] - windowed co-occurrence of individually benign
//!    trigger terms.
//!
//! Each stage emits [`SpanMatch`] values; the pipeline merges them.

mod context;
mod pattern;
mod phrase;

pub use context::ContextAnalyzer;
pub use pattern::{PatternMatcher, PatternScan};
pub use phrase::PhraseMatcher;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::severity::Severity;

/// A single detected occurrence of a rule firing against a text.
///
/// Spans are byte offsets into the original (un-lowercased) text and always
/// fall on character boundaries. Matches are ephemeral: created per analysis
/// call and discarded with the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanMatch {
    /// Category copied from the triggering rule.
    pub category: Category,
    /// Severity copied from the triggering rule.
    pub severity: Severity,
    /// Byte offset where the matched span starts.
    pub start: usize,
    /// Byte offset where the matched span ends (exclusive).
    pub end: usize,
    /// The text that matched, as it appears in the source.
    pub matched: String,
    /// Replacement text from the rule, if it defines one.
    pub replacement: Option<String>,
    /// Snippet of surrounding text, for logging and audit.
    pub context: String,
}

impl SpanMatch {
    /// Returns the matched span as a range.
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    /// Returns true if this span overlaps the other.
    pub fn overlaps(&self, other: &SpanMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Extracts a snippet of up to `window` bytes on each side of a span,
/// snapped outward to character boundaries.
pub(crate) fn context_snippet(text: &str, start: usize, end: usize, window: usize) -> String {
    let mut from = start.saturating_sub(window);
    while from > 0 && !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + window).min(text.len());
    while to < text.len() && !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to].to_string()
}

/// Lowercased view of a text with a byte-offset map back to the original.
///
/// `str::to_lowercase` is not length-preserving for all scripts, so spans
/// found in the lowered text cannot be used directly against the original.
/// This map records, for every byte of the lowered text, the byte offset of
/// the original character it came from.
pub(crate) struct LowerMap {
    lower: String,
    /// `offsets[i]` is the original byte offset of the character that
    /// produced lowered byte `i`; one extra trailing entry holds the
    /// original length.
    offsets: Vec<usize>,
}

impl LowerMap {
    pub fn new(text: &str) -> Self {
        let mut lower = String::with_capacity(text.len());
        let mut offsets = Vec::with_capacity(text.len() + 1);
        for (pos, ch) in text.char_indices() {
            for lowered in ch.to_lowercase() {
                let before = lower.len();
                lower.push(lowered);
                for _ in before..lower.len() {
                    offsets.push(pos);
                }
            }
        }
        offsets.push(text.len());
        Self { lower, offsets }
    }

    /// The lowercased text.
    pub fn lower(&self) -> &str {
        &self.lower
    }

    /// Maps a span in the lowered text back to a span in the original.
    ///
    /// When a single original character lowercases to several characters and
    /// the span ends mid-expansion, the original span is widened to cover
    /// that whole character.
    pub fn to_original(&self, start: usize, end: usize) -> (usize, usize) {
        debug_assert!(start < end && end <= self.lower.len());
        let orig_start = self.offsets[start];
        let last_char_start = self.offsets[end - 1];
        let mut idx = end;
        while self.offsets[idx] == last_char_start {
            idx += 1;
        }
        (orig_start, self.offsets[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_match_overlap() {
        let a = SpanMatch {
            category: Category::General,
            severity: Severity::Low,
            start: 0,
            end: 5,
            matched: "abcde".into(),
            replacement: None,
            context: String::new(),
        };
        let mut b = a.clone();
        b.start = 4;
        b.end = 8;
        assert!(a.overlaps(&b));
        b.start = 5;
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn snippet_clamps_to_text() {
        assert_eq!(context_snippet("hello world", 0, 5, 100), "hello world");
        assert_eq!(context_snippet("hello world", 6, 11, 2), "o world");
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = "héllo wörld";
        let snippet = context_snippet(text, 3, 7, 2);
        assert!(text.contains(&snippet));
    }

    #[test]
    fn lower_map_ascii_is_identity() {
        let map = LowerMap::new("Hello World");
        assert_eq!(map.lower(), "hello world");
        assert_eq!(map.to_original(6, 11), (6, 11));
    }

    #[test]
    fn lower_map_handles_expanding_chars() {
        // U+0130 (Latin capital I with dot above) lowercases to two chars.
        let text = "\u{130}stanbul";
        let map = LowerMap::new(text);
        assert!(map.lower().starts_with('i'));
        // A span covering the first lowered character maps back to the
        // original two-byte capital.
        let (start, end) = map.to_original(0, 1);
        assert_eq!(start, 0);
        assert_eq!(end, '\u{130}'.len_utf8());
    }

    #[test]
    fn lower_map_full_span_covers_original() {
        let text = "Grüße \u{130}stanbul";
        let map = LowerMap::new(text);
        let len = map.lower().len();
        assert_eq!(map.to_original(0, len), (0, text.len()));
    }
}
