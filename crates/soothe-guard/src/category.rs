//! Content categories for harmful-content matches.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Categories that harmful content can be classified into.
///
/// A match belongs to exactly one category; a text may violate several
/// categories at once.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Direct references to suicide or self-injury.
    SelfHarm,
    /// Indirect or euphemistic references to self-harm.
    SelfHarmEuphemism,
    /// Expressions of severe emotional distress.
    ExtremeDistress,
    /// Risky behaviors such as substance misuse or disordered eating.
    DangerousBehaviors,
    /// Eating-disorder behaviors and pro-ED language.
    EatingDisorder,
    /// Academic stress and giving-up language.
    AcademicDistress,
    /// Extreme academic pressure expressions ("rather die than fail").
    AcademicExtreme,
    /// Advice that discourages seeking help.
    IsolationAdvice,
    /// Unhelpful coping advice ("just get over it").
    HarmfulCoping,
    /// Harmful meaning emerging from co-occurring benign terms.
    ConcerningCombination,
    /// Family-pressure themes combined with distress language.
    FamilyPressure,
    /// Uncategorized entries loaded without an explicit category header.
    General,
}

impl Category {
    /// Returns all available categories.
    pub fn all() -> &'static [Category] {
        &[
            Category::SelfHarm,
            Category::SelfHarmEuphemism,
            Category::ExtremeDistress,
            Category::DangerousBehaviors,
            Category::EatingDisorder,
            Category::AcademicDistress,
            Category::AcademicExtreme,
            Category::IsolationAdvice,
            Category::HarmfulCoping,
            Category::ConcerningCombination,
            Category::FamilyPressure,
            Category::General,
        ]
    }

    /// Returns a human-readable name for this category.
    pub fn name(&self) -> &'static str {
        match self {
            Category::SelfHarm => "Self-Harm",
            Category::SelfHarmEuphemism => "Self-Harm Euphemism",
            Category::ExtremeDistress => "Extreme Distress",
            Category::DangerousBehaviors => "Dangerous Behaviors",
            Category::EatingDisorder => "Eating Disorder",
            Category::AcademicDistress => "Academic Distress",
            Category::AcademicExtreme => "Academic Extreme",
            Category::IsolationAdvice => "Isolation Advice",
            Category::HarmfulCoping => "Harmful Coping",
            Category::ConcerningCombination => "Concerning Combination",
            Category::FamilyPressure => "Family Pressure",
            Category::General => "General",
        }
    }

    /// Returns the snake_case identifier used in rule files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::SelfHarm => "self_harm",
            Category::SelfHarmEuphemism => "self_harm_euphemism",
            Category::ExtremeDistress => "extreme_distress",
            Category::DangerousBehaviors => "dangerous_behaviors",
            Category::EatingDisorder => "eating_disorder",
            Category::AcademicDistress => "academic_distress",
            Category::AcademicExtreme => "academic_extreme",
            Category::IsolationAdvice => "isolation_advice",
            Category::HarmfulCoping => "harmful_coping",
            Category::ConcerningCombination => "concerning_combination",
            Category::FamilyPressure => "family_pressure",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a category name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCategoryError(pub String);

impl fmt::Display for ParseCategoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category: {}", self.0)
    }
}

impl std::error::Error for ParseCategoryError {}

impl FromStr for Category {
    type Err = ParseCategoryError;

    /// Parses a snake_case category identifier case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Category::all()
            .iter()
            .find(|c| c.as_str() == normalized)
            .copied()
            .ok_or_else(|| ParseCategoryError(normalized))
    }
}
