//! Structured results of formula analyses.
//!
//! Field names match the backend JSON keys. Every list defaults to empty so
//! a partial answer still decodes; an empty list means "nothing to show",
//! never an error.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three analyses a formula session can run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Check whether the formula is valid.
    Validate,
    /// Explain how the formula works.
    Explain,
    /// Diagnose why the formula fails.
    Debug,
}

impl AnalysisKind {
    /// All kinds, in tab order.
    pub const ALL: [Self; 3] = [Self::Validate, Self::Explain, Self::Debug];

    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Explain => "explain",
            Self::Debug => "debug",
        }
    }

    /// Message shown when this analysis fails.
    #[must_use]
    pub const fn failure_notice(self) -> &'static str {
        match self {
            Self::Validate => "Failed to validate formula",
            Self::Explain => "Failed to explain formula",
            Self::Debug => "Failed to debug formula",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A titled, non-empty list ready for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResultSection<'a> {
    /// Section heading.
    pub title: &'static str,
    /// Items, never empty.
    pub items: &'a [String],
}

fn non_empty_sections<'a>(
    lists: impl IntoIterator<Item = (&'static str, &'a [String])>,
) -> Vec<ResultSection<'a>> {
    lists
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .map(|(title, items)| ResultSection { title, items })
        .collect()
}

/// Outcome of validating a formula.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the formula is valid.
    #[serde(default)]
    pub is_valid: bool,
    /// What the formula does.
    #[serde(default)]
    pub explanation: String,
    /// Problems found.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Recommended practices.
    #[serde(default)]
    pub best_practices: Vec<String>,
    /// Other ways to write it.
    #[serde(default)]
    pub alternatives: Vec<String>,
}

impl ValidationResult {
    /// Non-empty lists in display order.
    #[must_use]
    pub fn sections(&self) -> Vec<ResultSection<'_>> {
        non_empty_sections([
            ("Issues", self.issues.as_slice()),
            ("Best Practices", self.best_practices.as_slice()),
            ("Alternatives", self.alternatives.as_slice()),
        ])
    }
}

/// One piece of a formula and what it does.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaComponent {
    /// The fragment of the formula.
    #[serde(default)]
    pub part: String,
    /// What that fragment does.
    #[serde(default)]
    pub explanation: String,
}

/// Outcome of explaining a formula.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationResult {
    /// Ordered evaluation steps.
    #[serde(default)]
    pub steps: Vec<String>,
    /// Ordered breakdown of the formula parts.
    #[serde(default)]
    pub components: Vec<FormulaComponent>,
    /// Typical uses.
    #[serde(default)]
    pub use_cases: Vec<String>,
    /// Usage tips.
    #[serde(default)]
    pub tips: Vec<String>,
}

impl ExplanationResult {
    /// Non-empty text lists in display order. Components are listed separately.
    #[must_use]
    pub fn sections(&self) -> Vec<ResultSection<'_>> {
        non_empty_sections([
            ("Steps", self.steps.as_slice()),
            ("Use Cases", self.use_cases.as_slice()),
            ("Tips", self.tips.as_slice()),
        ])
    }

    /// True when there is nothing at all to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
            && self.components.is_empty()
            && self.use_cases.is_empty()
            && self.tips.is_empty()
    }
}

/// Outcome of debugging a formula.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugResult {
    /// Likely causes of the error.
    #[serde(default)]
    pub causes: Vec<String>,
    /// Ways to fix it.
    #[serde(default)]
    pub fixes: Vec<String>,
    /// How to avoid it next time.
    #[serde(default)]
    pub prevention: Vec<String>,
    /// Other approaches.
    #[serde(default)]
    pub alternatives: Vec<String>,
}

impl DebugResult {
    /// Non-empty lists in display order.
    #[must_use]
    pub fn sections(&self) -> Vec<ResultSection<'_>> {
        non_empty_sections([
            ("Common Causes", self.causes.as_slice()),
            ("Fixes", self.fixes.as_slice()),
            ("Prevention Tips", self.prevention.as_slice()),
            ("Alternative Approaches", self.alternatives.as_slice()),
        ])
    }

    /// True when there is nothing at all to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections().is_empty()
    }
}
