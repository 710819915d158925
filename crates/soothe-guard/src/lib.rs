//! Soothe Guard - content safety pipeline for LLM-driven narratives.
//!
//! This crate screens user input and model output in a mental-health themed
//! interactive story, providing:
//!
//! - Phrase, regex, and co-occurrence rule matching with severity tiers
//! - Span-level filtering with idempotent replacement text
//! - Crisis redirection with hotline resources for critical content
//! - File-based rule sources with load-time validation and atomic reload
//! - A hardcoded critical-only fallback so the filter never fails open
//!
//! # Usage
//!
//! ```ignore
//! use soothe_guard::{FilterConfig, FilterPipeline};
//!
//! let config = FilterConfig::from_file("guard.json")?;
//! let pipeline = FilterPipeline::with_fallback(config);
//!
//! let (ok, reply) = pipeline.check_input_safety(user_message);
//! if !ok {
//!     return reply; // crisis message or safe-alternative redirect
//! }
//!
//! let safe_output = pipeline.filter_response_safety(&model_output);
//! ```

pub mod category;
pub mod config;
pub mod matcher;
pub mod pipeline;
pub mod report;
pub mod responses;
pub mod ruleset;
pub mod severity;

pub use category::{Category, ParseCategoryError};
pub use config::{load_ruleset, ConfigError, FilterConfig};
pub use matcher::SpanMatch;
pub use pipeline::{AnalysisResult, FilterPipeline};
pub use report::FilterReport;
pub use ruleset::{
    ContextDef, ContextRule, PatternDef, PatternRule, PhraseRule, RuleError, RuleSet,
    DEFAULT_REPLACEMENT,
};
pub use severity::{ParseSeverityError, Severity};
