//! Regex pattern matching with a per-rule time budget.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::ruleset::{PatternRule, RuleSet};

use super::{context_snippet, SpanMatch};

/// Cap on matches reported per rule per text. A rule that fires more often
/// than this on one text is degenerate and is cut off.
const MAX_MATCHES_PER_RULE: usize = 64;

/// Result of one pattern-matching pass.
#[derive(Debug, Default)]
pub struct PatternScan {
    /// All matches found.
    pub matches: Vec<SpanMatch>,
    /// Names of rules that exceeded their scan budget. Matches collected
    /// before the cutoff are kept; the rule is reported as degraded.
    pub degraded_rules: Vec<String>,
}

/// Regex matcher over the pattern ruleset.
///
/// Expressions are compiled once at load time; this matcher only runs them.
/// The regex engine guarantees linear-time matching, so the per-rule budget
/// is a backstop against degenerate rule/input combinations, not the primary
/// defense.
pub struct PatternMatcher<'r> {
    rules: &'r RuleSet,
    context_window: usize,
    budget: Duration,
}

impl<'r> PatternMatcher<'r> {
    /// Creates a matcher over the pattern rules of the given set.
    pub fn new(rules: &'r RuleSet, context_window: usize, budget: Duration) -> Self {
        Self {
            rules,
            context_window,
            budget,
        }
    }

    /// Runs every pattern rule against the text.
    ///
    /// Zero-length matches are skipped. A rule that exhausts its budget is
    /// cut off and reported in [`PatternScan::degraded_rules`]; the scan
    /// continues with the remaining rules.
    pub fn scan(&self, text: &str) -> PatternScan {
        let mut scan = PatternScan::default();
        if text.is_empty() {
            return scan;
        }

        // Prefilter: find which rules match at all before extracting spans.
        let firing: Vec<usize> = self.rules.pattern_set().matches(text).iter().collect();

        for idx in firing {
            let rule = &self.rules.patterns()[idx];
            self.scan_rule(rule, text, &mut scan);
        }

        scan
    }

    fn scan_rule(&self, rule: &PatternRule, text: &str, scan: &mut PatternScan) {
        let started = Instant::now();
        let mut reported = 0usize;

        for m in rule.regex.find_iter(text) {
            if m.start() == m.end() {
                continue;
            }

            scan.matches.push(SpanMatch {
                category: rule.category,
                severity: rule.severity,
                start: m.start(),
                end: m.end(),
                matched: m.as_str().to_string(),
                replacement: rule.replacement.clone(),
                context: context_snippet(text, m.start(), m.end(), self.context_window),
            });
            reported += 1;

            if reported >= MAX_MATCHES_PER_RULE || started.elapsed() > self.budget {
                warn!(
                    rule = %rule.name,
                    matches = reported,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "pattern rule cut off, reporting as degraded"
                );
                scan.degraded_rules.push(rule.name.clone());
                return;
            }
        }

        if started.elapsed() > self.budget {
            warn!(
                rule = %rule.name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "pattern rule exceeded scan budget"
            );
            scan.degraded_rules.push(rule.name.clone());
        }
    }
}
