//! Validation of candidate reference documents.
//!
//! Two independent checks run over the candidate text:
//! - the strict check hands every eligible fenced block to a [`CodeChecker`]
//! - syntax verification matches canonical and incorrect forms from a static
//!   table, and the required pattern list is checked for absences
//!
//! The result depends only on the text and the static tables, so validating
//! the same document twice yields identical results.

mod blocks;
mod checker;
mod patterns;
mod strict;
mod syntax;

use tracing::{info, instrument};

use llmdocs_markdown::{FenceScan, scan_fences};
use llmdocs_shared::{
    PatternResult, Recommendation, Result, StrictResult, SyntaxResult, ValidateConfig,
    ValidationResult,
};

pub use checker::{CheckOutcome, CodeChecker, SubprocessChecker};
pub use patterns::{REQUIRED_PATTERNS, find_patterns};

/// Validate a candidate document.
///
/// Fails only when the checker cannot run; every finding about the document
/// itself is part of the returned result.
#[instrument(skip_all, fields(bytes = text.len()))]
pub fn validate(
    text: &str,
    config: &ValidateConfig,
    checker: &dyn CodeChecker,
) -> Result<ValidationResult> {
    let scan = scan_fences(text);

    let mut issues = Vec::new();
    if text.trim().is_empty() {
        issues.push("candidate document is empty".to_string());
    }
    if let Some(line) = scan.unterminated_at {
        issues.push(format!("unbalanced code fence opened at line {line}"));
    }

    let selected: Vec<_> = blocks::select_blocks(&scan.blocks, &config.language_tags).collect();
    let strict = strict::strict_check(&selected, checker, config.max_errors)?;
    let syntax = syntax::verify_syntax(&syntax_text(text, &scan, &config.language_tags));
    let patterns = patterns::check_patterns(text);

    let recommendation = recommend(&strict, &syntax, &patterns);

    info!(
        passed = strict.passed,
        failed = strict.failed,
        skipped = strict.skipped,
        incorrect = syntax.incorrect.len(),
        missing = patterns.missing.len(),
        %recommendation,
        "validation complete"
    );

    Ok(ValidationResult {
        strict,
        syntax,
        patterns,
        issues,
        recommendation,
    })
}

/// PASS only when nothing failed, nothing is incorrect, and nothing required
/// is missing. Document issues are informational.
pub fn recommend(
    strict: &StrictResult,
    syntax: &SyntaxResult,
    patterns: &PatternResult,
) -> Recommendation {
    if strict.failed == 0 && syntax.all_correct && patterns.missing.is_empty() {
        Recommendation::Pass
    } else {
        Recommendation::Review
    }
}

/// Text subject to syntax verification: prose plus real examples in the
/// target language. Other languages and intentionally invalid examples are
/// left out, fence lines included.
fn syntax_text(text: &str, scan: &FenceScan, tags: &[String]) -> String {
    let excluded: Vec<(usize, usize)> = scan
        .blocks
        .iter()
        .map(|b| {
            if b.is_tagged(tags) && !blocks::is_marked_wrong(b) {
                // Keep the body, drop the fences.
                (b.open_line, b.open_line)
            } else {
                (b.open_line, b.close_line)
            }
        })
        .chain(scan.blocks.iter().map(|b| (b.close_line, b.close_line)))
        .collect();

    text.lines()
        .enumerate()
        .filter(|(i, _)| {
            let line_no = i + 1;
            !excluded.iter().any(|&(s, e)| s <= line_no && line_no <= e)
        })
        .map(|(_, l)| l)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmdocs_shared::LlmDocsError;

    /// Rejects archetypes declaring a non-default attribute after a default
    /// one, as the real compiler does.
    struct AttributeOrder;

    impl CodeChecker for AttributeOrder {
        fn check(&self, code: &str) -> Result<CheckOutcome> {
            let mut seen_default = false;
            for attr in code.split("has ").skip(1) {
                let decl = attr.split(';').next().unwrap_or_default();
                if decl.contains('=') {
                    seen_default = true;
                } else if seen_default {
                    return Ok(CheckOutcome::fail(
                        "line 1: non-default argument follows default argument",
                    ));
                }
            }
            Ok(CheckOutcome::pass())
        }
    }

    struct Unavailable;

    impl CodeChecker for Unavailable {
        fn check(&self, _code: &str) -> Result<CheckOutcome> {
            Err(LlmDocsError::ValidatorUnavailable("jac: not found".into()))
        }
    }

    const GOOD: &str = "# Jac Reference\n\n\
        ## Graph\n\n\
        ```jac\n\
        node Person {\n    has name: str;\n    has active: bool = True;\n}\n\
        edge Knows {\n    has since: int = 2020;\n}\n\
        walker Greeter {\n    can greet with Person entry {\n        report here.name;\n        visit [-->];\n    }\n}\n\
        def summarize(text: str) -> str by llm();\n\
        with entry {\n    a = Person(name=\"A\");\n    root ++> a;\n    root +>: Knows(since=2021) +> Person(name=\"B\");\n    friends = [root ->:Knows:->];\n    root spawn Greeter();\n}\n\
        ```\n\n\
        ## Common mistakes\n\n\
        ```jac wrong\n\
        node Person {\n    has active: bool = true;\n}\n\
        ```\n";

    #[test]
    fn clean_document_passes() {
        let result = validate(GOOD, &ValidateConfig::default(), &AttributeOrder).unwrap();
        assert_eq!(result.strict.failed, 0);
        assert_eq!(result.strict.passed, 1);
        assert_eq!(result.strict.skipped, 1);
        assert!(result.syntax.all_correct, "{:?}", result.syntax.incorrect);
        assert!(result.patterns.missing.is_empty(), "{:?}", result.patterns.missing);
        assert!(result.issues.is_empty());
        assert_eq!(result.recommendation, Recommendation::Pass);
    }

    #[test]
    fn validation_is_idempotent() {
        let config = ValidateConfig::default();
        let a = validate(GOOD, &config, &AttributeOrder).unwrap();
        let b = validate(GOOD, &config, &AttributeOrder).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn attribute_order_failure_points_at_block() {
        let text = format!("{GOOD}\n## Broken\n\n```jac\nnode N {{ has x: int = 0; has y: str; }}\n```\n");
        let broken_line = text.lines().position(|l| l.starts_with("node N {")).unwrap() + 1;

        let result = validate(&text, &ValidateConfig::default(), &AttributeOrder).unwrap();
        assert_eq!(result.strict.failed, 1);
        assert_eq!(result.strict.errors.len(), 1);
        assert_eq!(result.strict.errors[0].line, broken_line);
        assert_eq!(result.strict.errors[0].source, "block 3");
        assert_eq!(result.recommendation, Recommendation::Review);
    }

    #[test]
    fn missing_required_pattern_forces_review() {
        let text = GOOD.replace("with entry {", "impl main {");
        let result = validate(&text, &ValidateConfig::default(), &AttributeOrder).unwrap();
        assert_eq!(result.strict.failed, 0);
        assert!(result.patterns.missing.contains(&"with entry".to_string()));
        assert_eq!(result.recommendation, Recommendation::Review);
    }

    #[test]
    fn wrong_examples_do_not_affect_syntax_table() {
        let result = validate(GOOD, &ValidateConfig::default(), &AttributeOrder).unwrap();
        let booleans = &result.syntax.checks["boolean literals"];
        assert!(booleans.found);
        assert!(booleans.correct);
    }

    #[test]
    fn incorrect_syntax_in_real_example_forces_review() {
        let text = GOOD.replace("has active: bool = True;", "has active: bool = true;");
        let result = validate(&text, &ValidateConfig::default(), &AttributeOrder).unwrap();
        assert!(!result.syntax.all_correct);
        assert_eq!(result.syntax.incorrect[0].construct, "boolean literals");
        assert_eq!(result.recommendation, Recommendation::Review);
    }

    #[test]
    fn unbalanced_fence_is_reported_without_changing_recommendation() {
        let text = format!("{GOOD}\n```text\nnot closed\n");
        let result = validate(&text, &ValidateConfig::default(), &AttributeOrder).unwrap();
        assert_eq!(result.strict.failed, 0);
        assert!(result.syntax.all_correct);
        assert!(result.patterns.missing.is_empty());
        assert_eq!(result.issues.len(), 1);
        assert!(result.issues[0].contains("unbalanced"));
        assert_eq!(result.recommendation, Recommendation::Pass);
    }

    #[test]
    fn error_list_capped_by_config() {
        let mut text = String::from(GOOD);
        for i in 0..15 {
            text.push_str(&format!("\n```jac\nnode N{i} {{ has x: int = 0; has y: str; }}\n```\n"));
        }
        let config = ValidateConfig {
            max_errors: 10,
            ..ValidateConfig::default()
        };
        let result = validate(&text, &config, &AttributeOrder).unwrap();
        assert_eq!(result.strict.failed, 15);
        assert_eq!(result.strict.errors.len(), 10);
        let lines: Vec<_> = result.strict.errors.iter().map(|e| e.line).collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
    }

    #[test]
    fn unavailable_checker_is_an_error() {
        let err = validate(GOOD, &ValidateConfig::default(), &Unavailable).unwrap_err();
        assert!(matches!(err, LlmDocsError::ValidatorUnavailable(_)));
    }

    #[test]
    fn recommendation_is_conjunctive() {
        let strict = StrictResult::default();
        let syntax = SyntaxResult {
            all_correct: true,
            ..SyntaxResult::default()
        };
        let patterns = PatternResult::default();
        assert_eq!(recommend(&strict, &syntax, &patterns), Recommendation::Pass);

        let failed = StrictResult {
            failed: 1,
            ..StrictResult::default()
        };
        assert_eq!(recommend(&failed, &syntax, &patterns), Recommendation::Review);

        let incorrect = SyntaxResult {
            all_correct: false,
            ..SyntaxResult::default()
        };
        assert_eq!(recommend(&strict, &incorrect, &patterns), Recommendation::Review);

        let missing = PatternResult {
            missing: vec!["with entry".into()],
            ..PatternResult::default()
        };
        assert_eq!(recommend(&strict, &syntax, &missing), Recommendation::Review);
    }
}
