//! Windowed co-occurrence analysis.
//!
//! Context rules catch harmful meaning that only emerges when individually
//! benign terms appear close together. Window semantics: a rule fires when
//! one occurrence of every trigger term fits inside a window of
//! `window_chars` bytes, measured from the start of the earliest occurrence
//! to the end of the latest.

use crate::ruleset::ContextRule;

use super::{context_snippet, SpanMatch};

/// One trigger occurrence in the text.
#[derive(Debug, Clone, Copy)]
struct Occurrence {
    start: usize,
    end: usize,
    trigger: usize,
}

/// Co-occurrence analyzer over the context ruleset.
pub struct ContextAnalyzer<'r> {
    rules: &'r [ContextRule],
    context_window: usize,
}

impl<'r> ContextAnalyzer<'r> {
    /// Creates an analyzer over the given context rules.
    pub fn new(rules: &'r [ContextRule], context_window: usize) -> Self {
        Self {
            rules,
            context_window,
        }
    }

    /// Runs every context rule against the text.
    ///
    /// Emits at most one match per rule: the leftmost window in which all
    /// triggers co-occur, spanning from the first trigger to the last. Rules
    /// firing on overlapping spans are all reported; the aggregator resolves
    /// severity by maximum, not rule order.
    pub fn scan(&self, text: &str) -> Vec<SpanMatch> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut matches = Vec::new();
        for rule in self.rules {
            if let Some((start, end)) = find_window(rule, text) {
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

/// Finds the leftmost qualifying window for a rule, if any.
fn find_window(rule: &ContextRule, text: &str) -> Option<(usize, usize)> {
    let trigger_count = rule.triggers.len();
    let mut occurrences: Vec<Occurrence> = Vec::new();

    for (trigger, regex) in rule.triggers.iter().enumerate() {
        let mut found = false;
        for m in regex.find_iter(text) {
            occurrences.push(Occurrence {
                start: m.start(),
                end: m.end(),
                trigger,
            });
            found = true;
        }
        // Every trigger must appear at least once anywhere before windowing
        // is worth computing.
        if !found {
            return None;
        }
    }

    occurrences.sort_by_key(|o| (o.start, o.end));

    // For each candidate left edge, extend right until all triggers are
    // covered, then test the covered span against the window. Extending
    // further right can only widen the span, so the minimal cover per left
    // edge is the only one worth checking.
    let mut seen = vec![0usize; trigger_count];
    for left in 0..occurrences.len() {
        seen.iter_mut().for_each(|c| *c = 0);
        let mut distinct = 0;
        let mut max_end = 0;

        for occ in &occurrences[left..] {
            if seen[occ.trigger] == 0 {
                distinct += 1;
            }
            seen[occ.trigger] += 1;
            max_end = max_end.max(occ.end);

            if distinct == trigger_count {
                let span_start = occurrences[left].start;
                if max_end - span_start <= rule.window_chars {
                    return Some((span_start, max_end));
                }
                // Covered but too wide; a shorter cover needs a new left edge.
                break;
            }
        }
    }

    None
}
