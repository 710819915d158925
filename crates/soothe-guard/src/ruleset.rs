//! Detection rules and the compiled, immutable rule set.
//!
//! A [`RuleSet`] is built once (at startup or on reload) and never mutated
//! afterwards. All regular expressions are compiled eagerly at build time so
//! that a bad pattern surfaces as a load error instead of failing on the hot
//! path.

use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};
use thiserror::Error;

use crate::category::Category;
use crate::severity::Severity;

/// Generic replacement used when a rule does not define its own.
pub const DEFAULT_REPLACEMENT: &str = "[Content filtered for safety.]";

/// Upper bound for compiled regex size. Oversized patterns are rejected at
/// load time rather than allowed to balloon memory.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Errors raised while compiling a rule set.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A pattern or trigger failed to compile.
    #[error("invalid regex in rule '{name}': {source}")]
    InvalidRegex {
        /// Name of the offending rule.
        name: String,
        /// The underlying compile error.
        source: regex::Error,
    },

    /// A phrase rule with an empty phrase.
    #[error("phrase rule in category '{0}' has an empty phrase")]
    EmptyPhrase(Category),

    /// A context rule with fewer than two triggers cannot express
    /// co-occurrence.
    #[error("context rule '{name}' needs at least two trigger terms")]
    TooFewTriggers {
        /// Name of the offending rule.
        name: String,
    },

    /// A context rule with a zero-width window can never fire.
    #[error("context rule '{name}' has a zero-character window")]
    ZeroWindow {
        /// Name of the offending rule.
        name: String,
    },
}

/// A literal phrase matched as a case-insensitive substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseRule {
    /// The phrase, stored lowercased for case-insensitive matching.
    pub phrase: String,
    /// Category of harmful content.
    pub category: Category,
    /// Severity of a match.
    pub severity: Severity,
    /// Replacement text; [`DEFAULT_REPLACEMENT`] is used when `None`.
    pub replacement: Option<String>,
}

impl PhraseRule {
    /// Creates a phrase rule, lowercasing the phrase.
    pub fn new(
        phrase: impl Into<String>,
        category: Category,
        severity: Severity,
        replacement: Option<String>,
    ) -> Self {
        Self {
            phrase: phrase.into().to_lowercase(),
            category,
            severity,
            replacement,
        }
    }
}

/// Definition of a regex rule, prior to compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDef {
    /// Identifier used in logs and error messages.
    pub name: String,
    /// The regular expression source (compiled case-insensitively).
    pub pattern: String,
    /// Category of harmful content.
    pub category: Category,
    /// Severity of a match.
    pub severity: Severity,
    /// Replacement text; [`DEFAULT_REPLACEMENT`] is used when `None`.
    pub replacement: Option<String>,
}

impl PatternDef {
    /// Creates a pattern definition.
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        category: Category,
        severity: Severity,
        replacement: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            category,
            severity,
            replacement,
        }
    }
}

/// A compiled regex rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    /// Identifier used in logs and error messages.
    pub name: String,
    /// The compiled, case-insensitive expression.
    pub regex: Regex,
    /// Category of harmful content.
    pub category: Category,
    /// Severity of a match.
    pub severity: Severity,
    /// Replacement text; [`DEFAULT_REPLACEMENT`] is used when `None`.
    pub replacement: Option<String>,
}

/// Definition of a co-occurrence rule, prior to compilation.
///
/// Each trigger is a regex fragment; it is wrapped in word boundaries and
/// compiled case-insensitively. Plain words and multi-word terms work as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDef {
    /// Identifier used in logs and error messages.
    pub name: String,
    /// Two or more trigger terms that must all co-occur.
    pub triggers: Vec<String>,
    /// Maximum width, in bytes of the source text, of the window containing
    /// one occurrence of every trigger.
    pub window_chars: usize,
    /// Category of harmful content.
    pub category: Category,
    /// Severity of a match.
    pub severity: Severity,
    /// Replacement text; [`DEFAULT_REPLACEMENT`] is used when `None`.
    pub replacement: Option<String>,
}

impl ContextDef {
    /// Creates a context rule definition.
    pub fn new(
        name: impl Into<String>,
        triggers: &[&str],
        window_chars: usize,
        category: Category,
        severity: Severity,
        replacement: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            window_chars,
            category,
            severity,
            replacement,
        }
    }
}

/// A compiled co-occurrence rule.
#[derive(Debug, Clone)]
pub struct ContextRule {
    /// Identifier used in logs and error messages.
    pub name: String,
    /// Original trigger terms, for logs and serialization.
    pub trigger_terms: Vec<String>,
    /// One compiled, word-boundary-wrapped regex per trigger.
    pub triggers: Vec<Regex>,
    /// Maximum co-occurrence window width in bytes.
    pub window_chars: usize,
    /// Category of harmful content.
    pub category: Category,
    /// Severity of a match.
    pub severity: Severity,
    /// Replacement text; [`DEFAULT_REPLACEMENT`] is used when `None`.
    pub replacement: Option<String>,
}

/// The complete, immutable rule set consumed by the matchers.
///
/// Reloading replaces the whole set atomically (see
/// [`FilterPipeline::reload`](crate::pipeline::FilterPipeline::reload));
/// there is no in-place mutation.
#[derive(Debug)]
pub struct RuleSet {
    phrases: Vec<PhraseRule>,
    patterns: Vec<PatternRule>,
    /// Prefilter over all pattern rules for fast "anything match?" checks.
    pattern_set: RegexSet,
    contexts: Vec<ContextRule>,
}

impl RuleSet {
    /// Compiles a rule set from definitions.
    ///
    /// Every regex is compiled here; any failure aborts the build so a bad
    /// pattern never reaches analysis.
    pub fn build(
        phrases: Vec<PhraseRule>,
        patterns: Vec<PatternDef>,
        contexts: Vec<ContextDef>,
    ) -> Result<Self, RuleError> {
        for phrase in &phrases {
            if phrase.phrase.trim().is_empty() {
                return Err(RuleError::EmptyPhrase(phrase.category));
            }
        }

        let mut compiled_patterns = Vec::with_capacity(patterns.len());
        for def in patterns {
            let regex = RegexBuilder::new(&def.pattern)
                .case_insensitive(true)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()
                .map_err(|source| RuleError::InvalidRegex {
                    name: def.name.clone(),
                    source,
                })?;
            compiled_patterns.push(PatternRule {
                name: def.name,
                regex,
                category: def.category,
                severity: def.severity,
                replacement: def.replacement,
            });
        }

        let pattern_set = RegexSetBuilder::new(
            compiled_patterns.iter().map(|p| p.regex.as_str()),
        )
        .case_insensitive(true)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|source| RuleError::InvalidRegex {
            name: "pattern prefilter".to_string(),
            source,
        })?;

        let mut compiled_contexts = Vec::with_capacity(contexts.len());
        for def in contexts {
            if def.triggers.len() < 2 {
                return Err(RuleError::TooFewTriggers { name: def.name });
            }
            if def.window_chars == 0 {
                return Err(RuleError::ZeroWindow { name: def.name });
            }
            let mut triggers = Vec::with_capacity(def.triggers.len());
            for term in &def.triggers {
                let regex = RegexBuilder::new(&format!(r"\b(?:{})\b", term))
                    .case_insensitive(true)
                    .size_limit(REGEX_SIZE_LIMIT)
                    .build()
                    .map_err(|source| RuleError::InvalidRegex {
                        name: def.name.clone(),
                        source,
                    })?;
                triggers.push(regex);
            }
            compiled_contexts.push(ContextRule {
                name: def.name,
                trigger_terms: def.triggers,
                triggers,
                window_chars: def.window_chars,
                category: def.category,
                severity: def.severity,
                replacement: def.replacement,
            });
        }

        Ok(Self {
            phrases,
            patterns: compiled_patterns,
            pattern_set,
            contexts: compiled_contexts,
        })
    }

    /// The built-in rule set shipped with the crate.
    ///
    /// Reproduces the curated blacklist, regex patterns, and co-occurrence
    /// combinations the narrative app has always enforced. Callers typically
    /// extend these with file-loaded rules via
    /// [`load_ruleset`](crate::config::load_ruleset).
    pub fn builtin() -> Self {
        Self::build(
            builtin_phrases(),
            builtin_patterns(),
            builtin_contexts(),
        )
        .expect("built-in rules compile")
    }

    /// Minimal last-line-of-defense rule set.
    ///
    /// Used when the configured rule sources fail to load entirely: the
    /// pipeline must never report "safe" for known-critical phrasing just
    /// because configuration is broken.
    pub fn critical_fallback() -> Self {
        let patterns = vec![
            PatternDef::new(
                "crisis_self_harm",
                r"\b(?:kill|comm?it).{0,20}(?:suicide|myself)\b",
                Category::SelfHarm,
                Severity::Critical,
                None,
            ),
            PatternDef::new(
                "crisis_end_life",
                r"\b(?:end|take).{0,20}(?:my|own).{0,20}life\b",
                Category::SelfHarm,
                Severity::Critical,
                None,
            ),
            PatternDef::new(
                "crisis_suicidal",
                r"\bsuicid(?:e|al)\b",
                Category::SelfHarm,
                Severity::Critical,
                None,
            ),
            PatternDef::new(
                "crisis_self_injury",
                r"\b(?:hurt|harm|cut|slash).{0,20}(?:myself|arms|wrists)\b",
                Category::SelfHarm,
                Severity::Critical,
                None,
            ),
            PatternDef::new(
                "crisis_ways_to_die",
                r"\bways\s+to\s+d(?:ie|eath)\b",
                Category::SelfHarm,
                Severity::Critical,
                None,
            ),
        ];
        Self::build(Vec::new(), patterns, Vec::new())
            .expect("fallback rules compile")
    }

    /// All phrase rules.
    pub fn phrases(&self) -> &[PhraseRule] {
        &self.phrases
    }

    /// All compiled pattern rules.
    pub fn patterns(&self) -> &[PatternRule] {
        &self.patterns
    }

    /// Prefilter set over all pattern rules.
    pub fn pattern_set(&self) -> &RegexSet {
        &self.pattern_set
    }

    /// All compiled context rules.
    pub fn contexts(&self) -> &[ContextRule] {
        &self.contexts
    }

    /// Total number of rules across all three kinds.
    pub fn len(&self) -> usize {
        self.phrases.len() + self.patterns.len() + self.contexts.len()
    }

    /// Returns true if the set contains no rules.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn phrase_block(
    category: Category,
    severity: Severity,
    replacement: &str,
    phrases: &[&str],
) -> Vec<PhraseRule> {
    phrases
        .iter()
        .map(|p| PhraseRule::new(*p, category, severity, Some(replacement.to_string())))
        .collect()
}

pub(crate) fn builtin_phrases() -> Vec<PhraseRule> {
    let mut rules = Vec::new();
    rules.extend(phrase_block(
        Category::SelfHarm,
        Severity::Critical,
        "[This content relates to serious concerns. Please reach out for support.]",
        &[
            "commit suicide",
            "kill myself",
            "end my life",
            "take my own life",
            "self-harm",
            "hurt myself",
            "cutting myself",
            "suicide methods",
            "hanging myself",
            "overdosing",
            "jumping off",
            "poison myself",
        ],
    ));
    rules.extend(phrase_block(
        Category::ExtremeDistress,
        Severity::High,
        "[Content filtered - seeking support is important.]",
        &[
            "i want to die",
            "i hate myself",
            "better off dead",
            "no reason to live",
            "worthless piece of trash",
            "nobody would miss me",
            "kill me now",
            "end it all",
            "can't take it anymore",
        ],
    ));
    rules.extend(phrase_block(
        Category::DangerousBehaviors,
        Severity::High,
        "[Content about harmful behaviors filtered.]",
        &[
            "stop eating",
            "purge",
            "starve myself",
            "take pills",
            "overdose",
            "substance abuse",
            "get drunk",
            "get high",
            "skip meals entirely",
            "binge and purge",
            "not eating for days",
        ],
    ));
    rules.extend(phrase_block(
        Category::AcademicDistress,
        Severity::Medium,
        "[Academic concerns filtered - support is available.]",
        &[
            "drop out",
            "run away",
            "give up on school",
            "academic failure",
            "failing everything",
            "can't handle school",
            "too stupid for this",
            "hate this school",
            "education is pointless",
        ],
    ));
    rules.extend(phrase_block(
        Category::IsolationAdvice,
        Severity::Medium,
        "[Content about avoiding help filtered - support is available.]",
        &[
            "don't seek help",
            "hide your feelings",
            "isolation",
            "avoid therapy",
            "no one can help",
            "don't tell anyone",
            "keep it secret",
            "therapy is useless",
            "counselors don't understand",
        ],
    ));
    rules.extend(phrase_block(
        Category::HarmfulCoping,
        Severity::Low,
        "[Content suggests unhelpful approaches - healthier strategies available.]",
        &[
            "just ignore it",
            "push through the pain",
            "toughen up",
            "stop being so sensitive",
            "get over it",
            "it's all in your head",
            "just think positive",
            "others have it worse",
        ],
    ));
    rules
}

pub(crate) fn builtin_patterns() -> Vec<PatternDef> {
    vec![
        PatternDef::new(
            "self_harm_euphemisms",
            r"\b(?:end\s+it\s+all|not\s+wake\s+up|go\s+to\s+sleep\s+forever)\b",
            Category::SelfHarmEuphemism,
            Severity::High,
            Some("[Content about serious concerns filtered.]".to_string()),
        ),
        PatternDef::new(
            "self_harm_descriptions",
            r"\b(?:cutting\s+deep(?:ly)?|cut(?:ting)?\s+(?:my|your)\s+(?:arm|wrist)s?|slash(?:ing)?\s+(?:my|your)\s+(?:arm|wrist)s?)\b",
            Category::SelfHarm,
            Severity::High,
            Some("[Content describing harmful actions filtered.]".to_string()),
        ),
        PatternDef::new(
            "academic_pressure_extremes",
            r"\b(?:rather\s+die\s+than\s+fail|kill\s+me\s+if.*(?:fail|exam)|death\s+before\s+dishonor.*grade)\b",
            Category::AcademicExtreme,
            Severity::High,
            Some("[Extreme academic pressure content filtered.]".to_string()),
        ),
        PatternDef::new(
            "isolation_commands",
            r"\b(?:stay\s+away\s+from.*help|avoid.*counselor|hide.*from.*parents)\b",
            Category::IsolationAdvice,
            Severity::Medium,
            Some("[Content about avoiding support filtered.]".to_string()),
        ),
        PatternDef::new(
            "eating_disorder_behaviors",
            r"\b(?:\d+\s*calories?|skip\w*\s+(?:\w+\s+)?meals?|binge\s+and\s+purge|pro\s*ana|pro\s*mia)\b",
            Category::EatingDisorder,
            Severity::High,
            Some("[Content about eating behaviors filtered.]".to_string()),
        ),
    ]
}

pub(crate) fn builtin_contexts() -> Vec<ContextDef> {
    vec![
        ContextDef::new(
            "despair_spiral",
            &[
                r"anxiet\w*|depress\w*|stress(?:ed|ful)?",
                r"fail(?:ing|ure)?|grades?|exams?",
                r"die|dying|end\s+it|kill",
            ],
            200,
            Category::ConcerningCombination,
            Severity::High,
            Some("[Content with concerning themes filtered.]".to_string()),
        ),
        ContextDef::new(
            "family_pressure",
            &[
                r"parents?|family",
                r"disappoint\w*|angry|upset|ashamed",
                r"can't|cannot|won't",
            ],
            200,
            Category::FamilyPressure,
            Severity::Medium,
            Some("[Content about family pressure filtered.]".to_string()),
        ),
    ]
}
