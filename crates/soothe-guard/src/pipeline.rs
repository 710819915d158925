//! The filter pipeline: aggregation and the public response policy.
//!
//! [`FilterPipeline`] is constructed once at startup and injected into the
//! narrative-engine collaborator; there is no global filter instance. The
//! rule set lives behind an `RwLock<Arc<RuleSet>>` so a reload swaps the
//! whole set atomically while in-flight analyses keep the set they started
//! with.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::category::Category;
use crate::config::{self, load_ruleset, FilterConfig};
use crate::matcher::{ContextAnalyzer, PatternMatcher, PhraseMatcher, SpanMatch};
use crate::responses::{crisis_message, safe_alternative, safety_disclaimer};
use crate::ruleset::{RuleSet, DEFAULT_REPLACEMENT};
use crate::severity::Severity;

/// The outcome of one full analysis pass over one text.
///
/// Constructed fresh per call and not retained by the pipeline; callers may
/// log or serialize it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// True when at least one rule matched.
    pub has_violations: bool,
    /// Maximum severity across matches; `None` when nothing matched.
    pub severity_score: Option<Severity>,
    /// Distinct categories among the matches.
    pub categories_violated: BTreeSet<Category>,
    /// All matches, ordered by span start.
    pub matches: Vec<SpanMatch>,
    /// Pattern rules that exceeded their scan budget on this text.
    pub degraded_rules: Vec<String>,
    /// The input with violating spans replaced.
    pub filtered_text: String,
    /// Wall-clock time spent in this analysis pass.
    pub processing_time: Duration,
}

impl AnalysisResult {
    fn safe(text: &str, processing_time: Duration) -> Self {
        Self {
            has_violations: false,
            severity_score: None,
            categories_violated: BTreeSet::new(),
            matches: Vec::new(),
            degraded_rules: Vec::new(),
            filtered_text: text.to_string(),
            processing_time,
        }
    }

    /// Returns true if any match is critical severity.
    pub fn is_critical(&self) -> bool {
        self.severity_score == Some(Severity::Critical)
    }
}

/// A contiguous stretch of text to be replaced, formed by merging
/// overlapping match spans.
struct Region {
    start: usize,
    end: usize,
    severity: Severity,
    replacement: Option<String>,
}

/// The content safety pipeline.
///
/// Three independent detection stages (phrase, pattern, context) run over
/// immutable shared rule data; their matches are merged into a single
/// [`AnalysisResult`]. The two public entry points apply the response
/// policy on top of [`FilterPipeline::analyze`].
pub struct FilterPipeline {
    rules: RwLock<Arc<RuleSet>>,
    config: FilterConfig,
}

impl FilterPipeline {
    /// Creates a pipeline over an already-built rule set.
    pub fn new(rules: RuleSet, config: FilterConfig) -> Self {
        Self {
            rules: RwLock::new(Arc::new(rules)),
            config,
        }
    }

    /// Creates a pipeline with the built-in rules and default configuration.
    pub fn builtin() -> Self {
        Self::new(RuleSet::builtin(), FilterConfig::default())
    }

    /// Loads all configured rule sources and builds the pipeline.
    ///
    /// Configuration errors are fatal here; use
    /// [`FilterPipeline::with_fallback`] when a degraded pipeline is
    /// preferable to no pipeline.
    pub fn from_config(config: FilterConfig) -> config::Result<Self> {
        let rules = load_ruleset(&config)?;
        Ok(Self::new(rules, config))
    }

    /// Loads the configured rule sources, falling back to the hardcoded
    /// critical rule set if loading fails.
    ///
    /// The pipeline never fails open: a broken configuration degrades to the
    /// minimal known-critical matcher instead of letting everything through.
    pub fn with_fallback(config: FilterConfig) -> Self {
        match load_ruleset(&config) {
            Ok(rules) => Self::new(rules, config),
            Err(err) => {
                error!(
                    error = %err,
                    "rule sources failed to load, falling back to minimal critical rule set"
                );
                Self::new(RuleSet::critical_fallback(), config)
            }
        }
    }

    /// Atomically replaces the rule set. In-flight analyses keep the set
    /// they started with.
    pub fn reload(&self, rules: RuleSet) {
        *self.rules.write().unwrap() = Arc::new(rules);
    }

    /// Returns a handle to the current rule set.
    pub fn ruleset(&self) -> Arc<RuleSet> {
        self.rules.read().unwrap().clone()
    }

    /// Total number of loaded rules.
    pub fn rule_count(&self) -> usize {
        self.ruleset().len()
    }

    /// Runs all three detection stages and aggregates their matches.
    ///
    /// No response policy is applied; `filtered_text` has violating spans
    /// replaced but the caller decides what to surface.
    pub fn analyze(&self, text: &str) -> AnalysisResult {
        let started = Instant::now();
        let rules = self.ruleset();

        if text.is_empty() {
            return AnalysisResult::safe(text, started.elapsed());
        }

        let mut matches =
            PhraseMatcher::new(rules.phrases(), self.config.context_window).scan(text);
        let pattern_scan = PatternMatcher::new(
            &rules,
            self.config.context_window,
            Duration::from_millis(self.config.pattern_budget_ms),
        )
        .scan(text);
        matches.extend(pattern_scan.matches);
        matches.extend(
            ContextAnalyzer::new(rules.contexts(), self.config.context_window).scan(text),
        );

        let result = aggregate(text, matches, pattern_scan.degraded_rules, started.elapsed());
        debug!(
            violations = result.matches.len(),
            severity = ?result.severity_score,
            elapsed_us = result.processing_time.as_micros() as u64,
            "analysis pass complete"
        );
        result
    }

    /// Checks user input before it is included in a prompt.
    ///
    /// The policy is binary pass/redirect: flagged input is never forwarded
    /// to the model, even partially, because it would leak harmful phrasing
    /// into the narrative context. Critical input gets the fixed
    /// crisis-resource message; anything else flagged gets the
    /// safe-alternative redirect.
    pub fn check_input_safety(&self, message: &str) -> (bool, String) {
        let result = self.analyze(message);
        if !result.has_violations {
            return (true, message.to_string());
        }

        log_metrics(&result, "user_input");

        if result.is_critical() {
            (false, crisis_message())
        } else {
            (false, safe_alternative(message))
        }
    }

    /// Filters a model response before it reaches the user.
    ///
    /// Critical content discards the entire response; partially-redacted
    /// critical output is never shown. Lesser violations return the
    /// span-filtered text, with the safety disclaimer appended when any
    /// match is high severity or above.
    pub fn filter_response_safety(&self, response: &str) -> String {
        let result = self.analyze(response);
        if !result.has_violations {
            return response.to_string();
        }

        log_metrics(&result, "model_response");

        if result.is_critical() {
            error!("critical content in model response, replacing entirely");
            return safe_alternative("the response contained critical content");
        }

        let mut filtered = result.filtered_text;
        if result.severity_score >= Some(Severity::High) {
            filtered.push_str("\n\n");
            filtered.push_str(&safety_disclaimer());
        }
        filtered
    }
}

/// Advisory telemetry; never load-bearing for correctness.
fn log_metrics(result: &AnalysisResult, text_kind: &str) {
    warn!(
        kind = text_kind,
        severity = ?result.severity_score,
        categories = ?result.categories_violated,
        matches = result.matches.len(),
        degraded = result.degraded_rules.len(),
        elapsed_us = result.processing_time.as_micros() as u64,
        "harmful content detected"
    );
    for m in &result.matches {
        debug!(
            category = %m.category,
            severity = %m.severity,
            matched = %m.matched,
            "match"
        );
    }
}

/// Merges the matches from all stages into a single result.
fn aggregate(
    text: &str,
    mut matches: Vec<SpanMatch>,
    degraded_rules: Vec<String>,
    processing_time: Duration,
) -> AnalysisResult {
    if matches.is_empty() {
        let mut result = AnalysisResult::safe(text, processing_time);
        result.degraded_rules = degraded_rules;
        return result;
    }

    // Order by span start; on ties the higher severity comes first so it
    // seeds the merged region.
    matches.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.severity.cmp(&a.severity))
            .then(a.end.cmp(&b.end))
    });

    let severity_score = matches.iter().map(|m| m.severity).max();
    let categories_violated: BTreeSet<Category> =
        matches.iter().map(|m| m.category).collect();

    // Overlapping spans merge to the union span; the replacement comes from
    // the highest-severity constituent.
    let mut regions: Vec<Region> = Vec::new();
    for m in &matches {
        if let Some(last) = regions.last_mut() {
            if m.start < last.end {
                last.end = last.end.max(m.end);
                if m.severity > last.severity {
                    last.severity = m.severity;
                    last.replacement = m.replacement.clone();
                }
                continue;
            }
        }
        regions.push(Region {
            start: m.start,
            end: m.end,
            severity: m.severity,
            replacement: m.replacement.clone(),
        });
    }

    let mut filtered_text = String::with_capacity(text.len());
    let mut cursor = 0;
    for region in &regions {
        filtered_text.push_str(&text[cursor..region.start]);
        filtered_text.push_str(
            region
                .replacement
                .as_deref()
                .unwrap_or(DEFAULT_REPLACEMENT),
        );
        cursor = region.end;
    }
    filtered_text.push_str(&text[cursor..]);

    AnalysisResult {
        has_violations: true,
        severity_score,
        categories_violated,
        matches,
        degraded_rules,
        filtered_text,
        processing_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> FilterPipeline {
        FilterPipeline::builtin()
    }

    // === Analysis invariants ===

    #[test]
    fn safe_text_has_no_violations() {
        let result = pipeline().analyze("a quiet afternoon of reading");
        assert!(!result.has_violations);
        assert_eq!(result.severity_score, None);
        assert!(result.categories_violated.is_empty());
        assert!(result.matches.is_empty());
        assert_eq!(result.filtered_text, "a quiet afternoon of reading");
    }

    #[test]
    fn empty_text_is_safe() {
        let result = pipeline().analyze("");
        assert!(!result.has_violations);
        assert_eq!(result.filtered_text, "");
    }

    #[test]
    fn has_violations_tracks_matches() {
        let result = pipeline().analyze("she wanted to give up on school");
        assert!(result.has_violations);
        assert_eq!(result.has_violations, !result.matches.is_empty());
    }

    #[test]
    fn severity_score_is_max_of_matches() {
        // "give up on school" is medium, "kill myself" is critical.
        let result = pipeline().analyze("give up on school and kill myself");
        assert_eq!(result.severity_score, Some(Severity::Critical));
    }

    #[test]
    fn categories_are_distinct_set_of_match_categories() {
        let result = pipeline().analyze("give up on school and kill myself");
        let expected: BTreeSet<Category> =
            result.matches.iter().map(|m| m.category).collect();
        assert_eq!(result.categories_violated, expected);
        assert!(result.categories_violated.contains(&Category::SelfHarm));
        assert!(result
            .categories_violated
            .contains(&Category::AcademicDistress));
    }

    #[test]
    fn matches_are_ordered_by_span_start() {
        let result = pipeline().analyze("drop out, then purge, then drop out again");
        assert!(result
            .matches
            .windows(2)
            .all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn filtered_text_replaces_violating_spans() {
        let result = pipeline().analyze("She planned to purge after dinner.");
        assert!(!result.filtered_text.contains("purge"));
        assert!(result.filtered_text.starts_with("She planned to "));
        assert!(result.filtered_text.ends_with(" after dinner."));
        assert!(result
            .filtered_text
            .contains("[Content about harmful behaviors filtered.]"));
    }

    #[test]
    fn overlapping_matches_merge_to_union_span() {
        // "end it all" fires both the extreme-distress phrase rule and the
        // self_harm_euphemisms pattern rule on the same span; only one
        // replacement is emitted.
        let result = pipeline().analyze("she wanted to end it all tonight");
        assert!(result.matches.len() >= 2);
        let replacements = result
            .filtered_text
            .matches("[Content filtered - seeking support is important.]")
            .count();
        assert_eq!(replacements, 1);
        assert!(!result.filtered_text.contains("end it all"));
        assert!(result.filtered_text.ends_with(" tonight"));
    }

    #[test]
    fn overlap_takes_higher_severity_replacement() {
        use crate::ruleset::PhraseRule;

        let phrases = vec![
            PhraseRule::new(
                "dark thought",
                Category::ExtremeDistress,
                Severity::Medium,
                Some("[medium filtered]".to_string()),
            ),
            PhraseRule::new(
                "dark thoughts",
                Category::SelfHarm,
                Severity::Critical,
                Some("[critical filtered]".to_string()),
            ),
        ];
        let rules = RuleSet::build(phrases, Vec::new(), Vec::new()).unwrap();
        let p = FilterPipeline::new(rules, FilterConfig::default());

        let result = p.analyze("having dark thoughts again");
        assert_eq!(result.matches.len(), 2);
        assert_eq!(result.severity_score, Some(Severity::Critical));
        assert!(result.filtered_text.contains("[critical filtered]"));
        assert!(!result.filtered_text.contains("[medium filtered]"));
    }

    // === Response policy ===

    #[test]
    fn critical_input_returns_crisis_message() {
        let (is_safe, text) = pipeline().check_input_safety("I want to end my life");
        assert!(!is_safe);
        assert!(text.contains("1-767"));
        assert!(!text.contains("end my life"));
    }

    #[test]
    fn benign_input_passes_through_unchanged() {
        let message = "I'm worried about my chemistry exam tomorrow";
        let (is_safe, text) = pipeline().check_input_safety(message);
        assert!(is_safe);
        assert_eq!(text, message);
    }

    #[test]
    fn non_critical_input_is_redirected_not_forwarded() {
        let (is_safe, text) = pipeline().check_input_safety("maybe I should just drop out");
        assert!(!is_safe);
        // Binary pass/redirect: no part of the original survives.
        assert!(!text.contains("drop out"));
        assert!(text.contains("constructive approaches"));
    }

    #[test]
    fn critical_response_is_discarded_entirely() {
        let response = "The story continued. She decided to commit suicide that night.";
        let filtered = pipeline().filter_response_safety(response);
        assert!(!filtered.contains("story continued"));
        assert!(!filtered.contains("commit suicide"));
        assert!(filtered.contains("**Safety Notice:**"));
    }

    #[test]
    fn high_severity_response_is_span_filtered_with_disclaimer() {
        let response = "Serena walked home slowly, feeling like she was better off dead.";
        let filtered = pipeline().filter_response_safety(response);
        assert!(filtered.contains("Serena walked home slowly"));
        assert!(!filtered.contains("better off dead"));
        assert!(filtered.contains("**Safety Notice:**"));
    }

    #[test]
    fn low_severity_response_has_no_disclaimer() {
        let response = "Her friend told her to just ignore it.";
        let filtered = pipeline().filter_response_safety(response);
        assert!(!filtered.contains("just ignore it"));
        assert!(!filtered.contains("**Safety Notice:**"));
    }

    #[test]
    fn clean_response_passes_unchanged() {
        let response = "Serena studied with her friends in the library.";
        assert_eq!(pipeline().filter_response_safety(response), response);
    }

    // === Lifecycle ===

    #[test]
    fn reload_swaps_ruleset_atomically() {
        let p = pipeline();
        let before = p.ruleset();
        assert!(p.analyze("she wanted to purge").has_violations);

        p.reload(RuleSet::critical_fallback());
        // The old handle is still usable; the pipeline sees the new set.
        assert!(!before.is_empty());
        assert!(!p.analyze("she wanted to purge").has_violations);
        assert!(p.analyze("thinking about suicide").has_violations);
    }

    #[test]
    fn fallback_pipeline_still_catches_critical_phrasing() {
        let p = FilterPipeline::new(RuleSet::critical_fallback(), FilterConfig::default());
        let (is_safe, text) = p.check_input_safety("how to commit suicide");
        assert!(!is_safe);
        assert!(text.contains("1-767"));
    }

    #[test]
    fn analysis_records_processing_time() {
        let result = pipeline().analyze("an unremarkable sentence");
        assert!(result.processing_time <= Duration::from_secs(1));
    }

    #[test]
    fn result_serializes_to_json() {
        let result = pipeline().analyze("she wanted to purge");
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"has_violations\":true"));
        assert!(json.contains("dangerous_behaviors"));
    }
}
