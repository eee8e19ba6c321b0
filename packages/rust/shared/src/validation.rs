//! Validation result types.
//!
//! A [`ValidationResult`] is derived purely from candidate text and static
//! rule tables, so it carries no timestamps or durations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// PASS/REVIEW gate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Pass,
    #[default]
    Review,
}

impl Recommendation {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Review => "REVIEW",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failing code block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrictError {
    /// Block identifier, e.g. `block 3`.
    pub source: String,
    /// 1-based document line of the block's first code line.
    pub line: usize,
    /// Diagnostic text reported by the checker.
    pub error: String,
    /// Single-line snippet of the offending code.
    pub code: String,
}

/// Aggregate of the strict (compile/check) pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrictResult {
    /// Language-tagged blocks considered.
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Percentage of checked blocks that passed (100 when none were checked).
    pub pass_rate: f64,
    /// First failures in document order, capped.
    pub errors: Vec<StrictError>,
}

/// Outcome of one canonical-syntax table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxCheck {
    /// Canonical form, for humans.
    pub expected: String,
    /// Correct or incorrect form located anywhere in the document.
    pub found: bool,
    /// No incorrect form present.
    pub correct: bool,
}

/// A syntax entry whose incorrect form was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncorrectSyntax {
    pub construct: String,
    pub expected: String,
}

/// Aggregate of the syntax verification pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntaxResult {
    pub all_correct: bool,
    /// Per-construct results keyed by construct name.
    pub checks: BTreeMap<String, SyntaxCheck>,
    /// Entries with `correct == false`, in table order.
    pub incorrect: Vec<IncorrectSyntax>,
}

/// Critical and required pattern coverage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternResult {
    /// Critical patterns present in the document.
    pub found: usize,
    /// Size of the critical pattern table.
    pub total: usize,
    /// Required patterns absent from the document, in list order.
    pub missing: Vec<String>,
}

/// Full validation of one candidate document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub strict: StrictResult,
    pub syntax: SyntaxResult,
    pub patterns: PatternResult,
    /// Structural issues (e.g. unbalanced fences). Informational only.
    #[serde(default)]
    pub issues: Vec<String>,
    pub recommendation: Recommendation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&Recommendation::Pass).unwrap(),
            "\"PASS\""
        );
        assert_eq!(
            serde_json::to_string(&Recommendation::Review).unwrap(),
            "\"REVIEW\""
        );
    }

    #[test]
    fn validation_json_has_contract_fields() {
        let result = ValidationResult::default();
        let value = serde_json::to_value(&result).unwrap();
        assert!(value["strict"]["failed"].is_number());
        assert!(value["strict"]["errors"].is_array());
        assert!(value["syntax"]["incorrect"].is_array());
        assert!(value["patterns"]["missing"].is_array());
        assert_eq!(value["recommendation"], "REVIEW");
    }
}
