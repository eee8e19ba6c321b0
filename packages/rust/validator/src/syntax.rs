//! Canonical-vs-incorrect syntax verification.
//!
//! Each table entry names a construct, the canonical form, and a pattern for
//! the incorrect form models tend to produce (usually borrowed from Python,
//! JavaScript, or Cypher). An entry whose incorrect form appears anywhere in
//! the checked text is reported as incorrect. Literal misuse only counts on
//! statement-shaped lines (ending in `;`, `{` or `}`), so prose is left alone.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use llmdocs_shared::{IncorrectSyntax, SyntaxCheck, SyntaxResult};

struct SyntaxRule {
    construct: &'static str,
    expected: &'static str,
    correct: &'static str,
    incorrect: Option<&'static str>,
}

const SYNTAX_RULES: &[SyntaxRule] = &[
    SyntaxRule {
        construct: "boolean literals",
        expected: "True / False",
        correct: r"\b(?:True|False)\b",
        incorrect: Some(r"(?m)(?:[=(,\[]|\b(?:return|if|while))[ \t]*(?:true|false)\b[^\n]*[;{}][ \t]*$"),
    },
    SyntaxRule {
        construct: "null literal",
        expected: "None",
        correct: r"\bNone\b",
        incorrect: Some(r"(?m)(?:[=(,\[]|\b(?:return|is))[ \t]*(?:null|nil)\b[^\n]*[;{}][ \t]*$"),
    },
    SyntaxRule {
        construct: "import",
        expected: "import from module { name }",
        correct: r"\bimport\s+from\s+[\w.]+\s*\{",
        incorrect: Some(r"(?m)^\s*from\s+[\w.]+\s+import\s+\w"),
    },
    SyntaxRule {
        construct: "typed attributes",
        expected: "has name: type;",
        correct: r"\bhas\s+\w+\s*:",
        incorrect: Some(r"\bhas\s+\w+\s*="),
    },
    SyntaxRule {
        construct: "visit statement",
        expected: "visit [-->];",
        correct: r"\bvisit\s+[^\s(]",
        incorrect: Some(r"\bvisit\s*\("),
    },
    SyntaxRule {
        construct: "walker spawn",
        expected: "root spawn Walker();",
        correct: r"\bspawn\s+\w+\s*\(",
        incorrect: Some(r"\.spawn\s*\("),
    },
    SyntaxRule {
        construct: "edge traversal",
        expected: "[-->] / [->:Edge:->]",
        correct: r"\[\s*(?:\w+\s*)?(?:-->|<--|<-->|->:\s*\w+|<-:\s*\w+)",
        incorrect: Some(r"-\[:\w+\]->"),
    },
    SyntaxRule {
        construct: "entry point",
        expected: "with entry { ... }",
        correct: r"\bwith\s+entry\s*\{",
        incorrect: Some(r#"\bif\s+__name__\s*==\s*["']__main__["']"#),
    },
    SyntaxRule {
        construct: "self reference",
        expected: "self.attr",
        correct: r"\bself\.\w+",
        incorrect: Some(r"\bthis\.\w+"),
    },
];

struct CompiledRule {
    rule: &'static SyntaxRule,
    correct: Regex,
    incorrect: Option<Regex>,
}

static COMPILED: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
    SYNTAX_RULES
        .iter()
        .map(|rule| CompiledRule {
            rule,
            correct: Regex::new(rule.correct).expect("valid regex"),
            incorrect: rule.incorrect.map(|p| Regex::new(p).expect("valid regex")),
        })
        .collect()
});

/// Run every table entry over `text`.
///
/// Entries not found at all count as correct; absence is the concern of
/// the required-pattern list.
pub(crate) fn verify_syntax(text: &str) -> SyntaxResult {
    let mut checks = BTreeMap::new();
    let mut incorrect = Vec::new();

    for compiled in COMPILED.iter() {
        let rule = compiled.rule;
        let has_incorrect = compiled.incorrect.as_ref().is_some_and(|re| re.is_match(text));
        let found = has_incorrect || compiled.correct.is_match(text);

        if has_incorrect {
            incorrect.push(IncorrectSyntax {
                construct: rule.construct.to_string(),
                expected: rule.expected.to_string(),
            });
        }
        checks.insert(
            rule.construct.to_string(),
            SyntaxCheck {
                expected: rule.expected.to_string(),
                found,
                correct: !has_incorrect,
            },
        );
    }

    SyntaxResult {
        all_correct: incorrect.is_empty(),
        checks,
        incorrect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_booleans_are_correct() {
        let result = verify_syntax("with entry {\n    done = True;\n    if not done { x = False; }\n}");
        let check = &result.checks["boolean literals"];
        assert!(check.found);
        assert!(check.correct);
        assert!(result.all_correct);
    }

    #[test]
    fn lowercase_booleans_flagged() {
        let result = verify_syntax("node A { has active: bool = true; }");
        let check = &result.checks["boolean literals"];
        assert!(check.found);
        assert!(!check.correct);
        assert!(!result.all_correct);
        assert_eq!(result.incorrect[0].construct, "boolean literals");
        assert_eq!(result.incorrect[0].expected, "True / False");
    }

    #[test]
    fn prose_mentions_are_not_keyword_usage() {
        let result = verify_syntax("Booleans are True and False, never true or false.");
        assert!(result.checks["boolean literals"].correct);
    }

    #[test]
    fn lowercase_literals_in_prose_are_ignored() {
        let text = "Set the flag if false positives matter (true by default).\n\
            Lookups return nil if nothing matches, so check is null first.\n";
        let result = verify_syntax(text);
        assert!(result.checks["boolean literals"].correct);
        assert!(result.checks["null literal"].correct);
        assert!(result.all_correct);

        let result = verify_syntax("if done == false {\n    return null;\n}\n");
        assert!(!result.checks["boolean literals"].correct);
        assert!(!result.checks["null literal"].correct);
    }

    #[test]
    fn absent_construct_is_not_found_but_correct() {
        let result = verify_syntax("Nothing relevant here.");
        let check = &result.checks["walker spawn"];
        assert!(!check.found);
        assert!(check.correct);
    }

    #[test]
    fn python_imports_and_cypher_edges_flagged() {
        let text = "from os import path\nfriends = [root -[:Knows]-> ];\n";
        let result = verify_syntax(text);
        let constructs: Vec<_> = result.incorrect.iter().map(|i| i.construct.as_str()).collect();
        assert_eq!(constructs, vec!["import", "edge traversal"]);
    }

    #[test]
    fn incorrect_list_follows_table_order() {
        let text = "x.spawn(w);\nhas y = 1;\nvisit(n);\n";
        let result = verify_syntax(text);
        let constructs: Vec<_> = result.incorrect.iter().map(|i| i.construct.as_str()).collect();
        assert_eq!(constructs, vec!["typed attributes", "visit statement", "walker spawn"]);
    }
}
