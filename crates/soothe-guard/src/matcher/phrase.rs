//! Exact-phrase matching against the blacklist.

use crate::ruleset::PhraseRule;

use super::{context_snippet, LowerMap, SpanMatch};

/// Substring matcher over the phrase blacklist.
///
/// Matching is substring-based, not token-based: "suicide methods" matches
/// inside "researching suicide methods online". Precision is deliberately
/// sacrificed for recall. Overlapping matches are all reported; the
/// aggregator resolves overlaps.
pub struct PhraseMatcher<'r> {
    rules: &'r [PhraseRule],
    context_window: usize,
}

impl<'r> PhraseMatcher<'r> {
    /// Creates a matcher over the given phrase rules.
    pub fn new(rules: &'r [PhraseRule], context_window: usize) -> Self {
        Self {
            rules,
            context_window,
        }
    }

    /// Returns every occurrence of every phrase in the text.
    ///
    /// Deterministic: same text and rules always produce the same matches.
    pub fn scan(&self, text: &str) -> Vec<SpanMatch> {
        if text.is_empty() {
            return Vec::new();
        }

        let map = LowerMap::new(text);
        let lower = map.lower();
        let mut matches = Vec::new();

        for rule in self.rules {
            for (pos, _) in lower.match_indices(rule.phrase.as_str()) {
                let (start, end) = map.to_original(pos, pos + rule.phrase.len());
                matches.push(SpanMatch {
                    category: rule.category,
                    severity: rule.severity,
                    start,
                    end,
                    matched: text[start..end].to_string(),
                    replacement: rule.replacement.clone(),
                    context: context_snippet(text, start, end, self.context_window),
                });
            }
        }

        matches
    }
}
