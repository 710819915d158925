//! Aggregate reporting over a batch of analyses.
//!
//! Intended for offline review of session logs: how often the filter fired,
//! which categories dominate, and whether pattern scanning is staying within
//! budget.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::category::Category;
use crate::pipeline::AnalysisResult;
use crate::severity::Severity;

/// Summary statistics over a batch of [`AnalysisResult`]s.
#[derive(Debug, Clone, Serialize)]
pub struct FilterReport {
    /// Number of analyses in the batch.
    pub total_analyzed: usize,
    /// Analyses with at least one violation.
    pub total_violations: usize,
    /// Fraction of analyses with a violation, 0.0 when the batch is empty.
    pub violation_rate: f64,
    /// Match counts keyed by snake_case category identifier.
    pub category_counts: BTreeMap<String, usize>,
    /// Match counts keyed by snake_case severity identifier.
    pub severity_counts: BTreeMap<String, usize>,
    /// Analyses in which any pattern rule exceeded its scan budget.
    pub degraded_analyses: usize,
    /// Mean processing time across the batch.
    pub avg_processing_time: Duration,
    /// Slowest single analysis in the batch.
    pub max_processing_time: Duration,
    /// Human-readable observations about the batch.
    pub recommendations: Vec<String>,
}

impl FilterReport {
    /// Builds a report from a batch of analysis results.
    pub fn from_results(results: &[AnalysisResult]) -> Self {
        let total_analyzed = results.len();
        let mut total_violations = 0;
        let mut degraded_analyses = 0;
        let mut category_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut severity_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_time = Duration::ZERO;
        let mut max_processing_time = Duration::ZERO;

        for result in results {
            if result.has_violations {
                total_violations += 1;
            }
            if !result.degraded_rules.is_empty() {
                degraded_analyses += 1;
            }
            for m in &result.matches {
                *category_counts.entry(m.category.as_str().to_string()).or_default() += 1;
                *severity_counts.entry(m.severity.as_str().to_string()).or_default() += 1;
            }
            total_time += result.processing_time;
            max_processing_time = max_processing_time.max(result.processing_time);
        }

        let violation_rate = if total_analyzed == 0 {
            0.0
        } else {
            total_violations as f64 / total_analyzed as f64
        };
        let avg_processing_time = if total_analyzed == 0 {
            Duration::ZERO
        } else {
            total_time / total_analyzed as u32
        };

        let recommendations = recommendations(
            violation_rate,
            &severity_counts,
            &category_counts,
            degraded_analyses,
        );

        Self {
            total_analyzed,
            total_violations,
            violation_rate,
            category_counts,
            severity_counts,
            degraded_analyses,
            avg_processing_time,
            max_processing_time,
            recommendations,
        }
    }
}

fn recommendations(
    violation_rate: f64,
    severity_counts: &BTreeMap<String, usize>,
    category_counts: &BTreeMap<String, usize>,
    degraded_analyses: usize,
) -> Vec<String> {
    let mut notes = Vec::new();

    let critical = severity_counts
        .get(Severity::Critical.as_str())
        .copied()
        .unwrap_or(0);
    if critical > 0 {
        notes.push(format!(
            "{critical} critical match(es) recorded; review session transcripts and confirm \
             crisis resources were surfaced."
        ));
    }

    if violation_rate > 0.25 {
        notes.push(format!(
            "Violation rate is {:.0}%; the upstream prompt may be steering conversations \
             toward flagged topics.",
            violation_rate * 100.0
        ));
    }

    if let Some((category, count)) = category_counts.iter().max_by_key(|(_, c)| **c) {
        if *count >= 5 {
            notes.push(format!(
                "Category '{category}' dominates with {count} matches; consider tuning its rules."
            ));
        }
    }

    let self_harm = category_counts
        .get(Category::SelfHarm.as_str())
        .copied()
        .unwrap_or(0);
    if self_harm > 0 {
        notes.push(format!(
            "{self_harm} self-harm match(es); verify hotline information is current."
        ));
    }

    if degraded_analyses > 0 {
        notes.push(format!(
            "{degraded_analyses} analyses ran with degraded pattern rules; check rule \
             complexity or raise the scan budget."
        ));
    }

    if notes.is_empty() {
        notes.push("No concerning trends in this batch.".to_string());
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FilterPipeline;

    fn analyze_batch(texts: &[&str]) -> Vec<AnalysisResult> {
        let pipeline = FilterPipeline::builtin();
        texts.iter().map(|t| pipeline.analyze(t)).collect()
    }

    #[test]
    fn empty_batch_reports_zeroes() {
        let report = FilterReport::from_results(&[]);
        assert_eq!(report.total_analyzed, 0);
        assert_eq!(report.total_violations, 0);
        assert_eq!(report.violation_rate, 0.0);
        assert_eq!(report.avg_processing_time, Duration::ZERO);
        assert_eq!(report.recommendations.len(), 1);
    }

    #[test]
    fn counts_violations_and_rate() {
        let results = analyze_batch(&[
            "the weather is nice today",
            "I want to hurt myself",
            "what should Serena have for lunch",
            "thinking about suicide methods",
        ]);
        let report = FilterReport::from_results(&results);
        assert_eq!(report.total_analyzed, 4);
        assert_eq!(report.total_violations, 2);
        assert!((report.violation_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn tallies_categories_and_severities() {
        let results = analyze_batch(&["I want to hurt myself"]);
        let report = FilterReport::from_results(&results);
        assert_eq!(
            report.category_counts.get("self_harm").copied().unwrap_or(0),
            1
        );
        assert!(report.severity_counts.contains_key("critical"));
    }

    #[test]
    fn count_maps_use_snake_case_keys_throughout() {
        let results = analyze_batch(&[
            "I want to hurt myself",
            "she wanted to give up on school",
        ]);
        let report = FilterReport::from_results(&results);
        let keys = report
            .category_counts
            .keys()
            .chain(report.severity_counts.keys());
        for key in keys {
            assert_eq!(key, &key.to_lowercase(), "key {key:?} is not snake_case");
        }
        assert!(report.severity_counts.contains_key("medium"));
    }

    #[test]
    fn critical_matches_produce_a_recommendation() {
        let results = analyze_batch(&["I want to commit suicide"]);
        let report = FilterReport::from_results(&results);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("critical")));
    }

    #[test]
    fn clean_batch_has_no_concerning_trends() {
        let results = analyze_batch(&["a calm chat about homework", "lunch plans"]);
        let report = FilterReport::from_results(&results);
        assert_eq!(report.recommendations, vec!["No concerning trends in this batch."]);
    }

    #[test]
    fn max_time_is_at_least_avg() {
        let results = analyze_batch(&["hello", "I want to hurt myself"]);
        let report = FilterReport::from_results(&results);
        assert!(report.max_processing_time >= report.avg_processing_time);
    }

    #[test]
    fn serializes_to_json() {
        let report = FilterReport::from_results(&[]);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"total_analyzed\":0"));
    }
}
