//! Configuration and rule-source loading.
//!
//! Rule sources are parsed and validated entirely at load time: a malformed
//! entry (unknown category or severity, bad regex, missing field) is a
//! [`ConfigError`], never a silently dropped rule. The hot path only ever
//! sees a fully compiled [`RuleSet`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::category::Category;
use crate::ruleset::{
    builtin_contexts, builtin_patterns, builtin_phrases, ContextDef, PatternDef, PhraseRule,
    RuleError, RuleSet,
};
use crate::severity::Severity;

/// Errors raised while loading rule sources.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A rule source file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A JSON rule source failed to parse.
    #[error("failed to parse {path}: {source}")]
    Json {
        /// Path of the file.
        path: PathBuf,
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// A blacklist directive names an unknown severity.
    #[error("{path}: line {line}: unknown severity '{value}'")]
    BlacklistSeverity {
        /// Path of the blacklist file.
        path: PathBuf,
        /// 1-based line number of the directive.
        line: usize,
        /// The rejected value.
        value: String,
    },

    /// A blacklist header names an unknown category.
    #[error("{path}: line {line}: unknown category '{value}'")]
    BlacklistCategory {
        /// Path of the blacklist file.
        path: PathBuf,
        /// 1-based line number of the header.
        line: usize,
        /// The rejected value.
        value: String,
    },

    /// A JSON rule names an unknown severity.
    #[error("{path}: rule '{rule}': unknown severity '{value}'")]
    RuleSeverity {
        /// Path of the rule file.
        path: PathBuf,
        /// Name of the rule.
        rule: String,
        /// The rejected value.
        value: String,
    },

    /// A JSON rule names an unknown category.
    #[error("{path}: rule '{rule}': unknown category '{value}'")]
    RuleCategory {
        /// Path of the rule file.
        path: PathBuf,
        /// Name of the rule.
        rule: String,
        /// The rejected value.
        value: String,
    },

    /// A rule failed to compile.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Pipeline configuration.
///
/// All fields have defaults; an empty config yields the built-in rules only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Phrase blacklist files (categorized text format).
    pub blacklist_files: Vec<PathBuf>,
    /// Pattern rule files (JSON).
    pub pattern_files: Vec<PathBuf>,
    /// Context rule files (JSON).
    pub context_files: Vec<PathBuf>,
    /// Bytes of surrounding text captured around each match for audit.
    pub context_window: usize,
    /// Per-rule scan budget for pattern matching, in milliseconds.
    pub pattern_budget_ms: u64,
    /// Whether the built-in rules are included alongside file-loaded ones.
    pub include_builtin_rules: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            blacklist_files: Vec::new(),
            pattern_files: Vec::new(),
            context_files: Vec::new(),
            context_window: 50,
            pattern_budget_ms: 25,
            include_builtin_rules: true,
        }
    }
}

impl FilterConfig {
    /// Reads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Loads every configured rule source and compiles the rule set.
///
/// The built-in rules are included unless the config opts out; file-loaded
/// rules extend them.
pub fn load_ruleset(config: &FilterConfig) -> Result<RuleSet> {
    let (mut phrases, mut patterns, mut contexts) = if config.include_builtin_rules {
        (builtin_phrases(), builtin_patterns(), builtin_contexts())
    } else {
        (Vec::new(), Vec::new(), Vec::new())
    };

    for path in &config.blacklist_files {
        let text = read(path)?;
        phrases.extend(parse_blacklist(path, &text)?);
    }
    for path in &config.pattern_files {
        let text = read(path)?;
        patterns.extend(parse_patterns(path, &text)?);
    }
    for path in &config.context_files {
        let text = read(path)?;
        contexts.extend(parse_contexts(path, &text)?);
    }

    Ok(RuleSet::build(phrases, patterns, contexts)?)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses the categorized blacklist text format.
///
/// Lines starting with `#` are comments. `[category_name]` switches the
/// current category; `SEVERITY:` and `REPLACEMENT:` directives set the
/// metadata applied to the phrases that follow; every other non-empty line
/// is a literal phrase.
pub fn parse_blacklist(path: &Path, text: &str) -> Result<Vec<PhraseRule>> {
    let mut phrases = Vec::new();
    let mut category = Category::General;
    let mut severity = Severity::Medium;
    let mut replacement: Option<String> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            let name = &line[1..line.len() - 1];
            category = name.parse().map_err(|_| ConfigError::BlacklistCategory {
                path: path.to_path_buf(),
                line: idx + 1,
                value: name.to_string(),
            })?;
            continue;
        }

        if let Some(value) = line.strip_prefix("SEVERITY:") {
            severity = value.parse().map_err(|_| ConfigError::BlacklistSeverity {
                path: path.to_path_buf(),
                line: idx + 1,
                value: value.trim().to_string(),
            })?;
            continue;
        }

        if let Some(value) = line.strip_prefix("REPLACEMENT:") {
            replacement = Some(value.trim().to_string());
            continue;
        }

        phrases.push(PhraseRule::new(line, category, severity, replacement.clone()));
    }

    Ok(phrases)
}

/// On-disk shape of a pattern rule.
#[derive(Debug, Deserialize)]
struct PatternRecord {
    name: String,
    pattern: String,
    severity: String,
    category: String,
    #[serde(default)]
    replacement: Option<String>,
}

/// Parses a JSON pattern rule file.
pub fn parse_patterns(path: &Path, text: &str) -> Result<Vec<PatternDef>> {
    let records: Vec<PatternRecord> =
        serde_json::from_str(text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let mut defs = Vec::with_capacity(records.len());
    for record in records {
        let severity = parse_rule_severity(path, &record.name, &record.severity)?;
        let category = parse_rule_category(path, &record.name, &record.category)?;
        defs.push(PatternDef::new(
            record.name,
            record.pattern,
            category,
            severity,
            record.replacement,
        ));
    }
    Ok(defs)
}

/// On-disk shape of a context rule.
#[derive(Debug, Deserialize)]
struct ContextRecord {
    name: String,
    triggers: Vec<String>,
    window_chars: usize,
    severity: String,
    category: String,
    #[serde(default)]
    replacement: Option<String>,
}

/// Parses a JSON context rule file.
pub fn parse_contexts(path: &Path, text: &str) -> Result<Vec<ContextDef>> {
    let records: Vec<ContextRecord> =
        serde_json::from_str(text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let mut defs = Vec::with_capacity(records.len());
    for record in records {
        let severity = parse_rule_severity(path, &record.name, &record.severity)?;
        let category = parse_rule_category(path, &record.name, &record.category)?;
        defs.push(ContextDef {
            name: record.name,
            triggers: record.triggers,
            window_chars: record.window_chars,
            category,
            severity,
            replacement: record.replacement,
        });
    }
    Ok(defs)
}

fn parse_rule_severity(path: &Path, rule: &str, value: &str) -> Result<Severity> {
    value.parse().map_err(|_| ConfigError::RuleSeverity {
        path: path.to_path_buf(),
        rule: rule.to_string(),
        value: value.to_string(),
    })
}

fn parse_rule_category(path: &Path, rule: &str, value: &str) -> Result<Category> {
    value.parse().map_err(|_| ConfigError::RuleCategory {
        path: path.to_path_buf(),
        rule: rule.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn p() -> &'static Path {
        Path::new("test_source")
    }

    // === Blacklist format ===

    #[test]
    fn parses_categorized_blacklist() {
        let text = "\
# curated additions
[self_harm]
SEVERITY: CRITICAL
REPLACEMENT: [filtered]
razor blades
swallow pills

[academic_distress]
SEVERITY: MEDIUM
burn my notes
";
        let phrases = parse_blacklist(p(), text).unwrap();
        assert_eq!(phrases.len(), 3);
        assert_eq!(phrases[0].phrase, "razor blades");
        assert_eq!(phrases[0].category, Category::SelfHarm);
        assert_eq!(phrases[0].severity, Severity::Critical);
        assert_eq!(phrases[0].replacement.as_deref(), Some("[filtered]"));
        assert_eq!(phrases[2].category, Category::AcademicDistress);
        assert_eq!(phrases[2].severity, Severity::Medium);
        // REPLACEMENT carries over until changed, as in the original format.
        assert_eq!(phrases[2].replacement.as_deref(), Some("[filtered]"));
    }

    #[test]
    fn blacklist_defaults_before_any_header() {
        let phrases = parse_blacklist(p(), "some phrase\n").unwrap();
        assert_eq!(phrases[0].category, Category::General);
        assert_eq!(phrases[0].severity, Severity::Medium);
        assert_eq!(phrases[0].replacement, None);
    }

    #[test]
    fn blacklist_skips_comments_and_blank_lines() {
        let text = "# comment\n\n   \nreal phrase\n";
        let phrases = parse_blacklist(p(), text).unwrap();
        assert_eq!(phrases.len(), 1);
    }

    #[test]
    fn blacklist_rejects_unknown_severity_with_line() {
        let err = parse_blacklist(p(), "[self_harm]\nSEVERITY: EXTREME\n").unwrap_err();
        match err {
            ConfigError::BlacklistSeverity { line, value, .. } => {
                assert_eq!(line, 2);
                assert_eq!(value, "EXTREME");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blacklist_rejects_unknown_category_with_line() {
        let err = parse_blacklist(p(), "\n[conspiracy]\n").unwrap_err();
        match err {
            ConfigError::BlacklistCategory { line, value, .. } => {
                assert_eq!(line, 2);
                assert_eq!(value, "conspiracy");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // === Pattern JSON ===

    #[test]
    fn parses_pattern_records() {
        let json = r#"[
            {
                "name": "late_night_spiral",
                "pattern": "\\bawake\\s+all\\s+night\\s+crying\\b",
                "severity": "HIGH",
                "category": "extreme_distress",
                "replacement": "[filtered]"
            }
        ]"#;
        let defs = parse_patterns(p(), json).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].severity, Severity::High);
        assert_eq!(defs[0].category, Category::ExtremeDistress);
    }

    #[test]
    fn pattern_replacement_is_optional() {
        let json = r#"[{"name": "x", "pattern": "y", "severity": "low", "category": "general"}]"#;
        let defs = parse_patterns(p(), json).unwrap();
        assert_eq!(defs[0].replacement, None);
    }

    #[test]
    fn pattern_missing_field_is_a_parse_error() {
        let json = r#"[{"name": "x", "severity": "low", "category": "general"}]"#;
        assert!(matches!(
            parse_patterns(p(), json).unwrap_err(),
            ConfigError::Json { .. }
        ));
    }

    #[test]
    fn pattern_rejects_unknown_severity_naming_rule() {
        let json = r#"[{"name": "x", "pattern": "y", "severity": "dire", "category": "general"}]"#;
        match parse_patterns(p(), json).unwrap_err() {
            ConfigError::RuleSeverity { rule, value, .. } => {
                assert_eq!(rule, "x");
                assert_eq!(value, "dire");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // === Context JSON ===

    #[test]
    fn parses_context_records() {
        let json = r#"[
            {
                "name": "shame_spiral",
                "triggers": ["disown", "ashamed", "pointless"],
                "window_chars": 150,
                "severity": "high",
                "category": "family_pressure"
            }
        ]"#;
        let defs = parse_contexts(p(), json).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].triggers.len(), 3);
        assert_eq!(defs[0].window_chars, 150);
    }

    // === End-to-end loading ===

    #[test]
    fn load_ruleset_defaults_to_builtin() {
        let rules = load_ruleset(&FilterConfig::default()).unwrap();
        assert!(!rules.is_empty());
        assert_eq!(rules.len(), RuleSet::builtin().len());
    }

    #[test]
    fn load_ruleset_extends_builtin_with_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[self_harm]\nSEVERITY: CRITICAL\nrazor blades").unwrap();

        let config = FilterConfig {
            blacklist_files: vec![file.path().to_path_buf()],
            ..Default::default()
        };
        let rules = load_ruleset(&config).unwrap();
        assert_eq!(rules.len(), RuleSet::builtin().len() + 1);
        assert!(rules.phrases().iter().any(|r| r.phrase == "razor blades"));
    }

    #[test]
    fn load_ruleset_missing_file_is_fatal() {
        let config = FilterConfig {
            pattern_files: vec![PathBuf::from("/nonexistent/patterns.json")],
            ..Default::default()
        };
        assert!(matches!(
            load_ruleset(&config).unwrap_err(),
            ConfigError::Io { .. }
        ));
    }

    #[test]
    fn load_ruleset_bad_regex_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "broken", "pattern": "(oops", "severity": "low", "category": "general"}}]"#
        )
        .unwrap();

        let config = FilterConfig {
            pattern_files: vec![file.path().to_path_buf()],
            ..Default::default()
        };
        assert!(matches!(
            load_ruleset(&config).unwrap_err(),
            ConfigError::Rule(RuleError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn config_from_file_round_trips() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"context_window": 80, "pattern_budget_ms": 10}}"#
        )
        .unwrap();

        let config = FilterConfig::from_file(file.path()).unwrap();
        assert_eq!(config.context_window, 80);
        assert_eq!(config.pattern_budget_ms, 10);
        assert!(config.include_builtin_rules);
        assert!(config.blacklist_files.is_empty());
    }

    #[test]
    fn default_config_values() {
        let config = FilterConfig::default();
        assert_eq!(config.context_window, 50);
        assert_eq!(config.pattern_budget_ms, 25);
        assert!(config.include_builtin_rules);
    }
}
