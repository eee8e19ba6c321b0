//! Critical construct coverage and required patterns.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use llmdocs_shared::PatternResult;

/// `(regex, name)` pairs for constructs a complete reference should show.
/// Matched case-insensitively.
const CRITICAL_PATTERNS: &[(&str, &str)] = &[
    (r"\+\+>", "edge: ++>"),
    (r"<\+\+>", "edge: <++>"),
    (r"-->", "edge: -->"),
    (r"<-->", "edge: <-->"),
    (r"\+>:", "typed connect: +>:"),
    (r":\+>", "typed connect: :+>"),
    (r"->:", "typed traversal: ->:"),
    (r":->", "typed traversal: :->"),
    (r"\bdel-->", "disconnect: del-->"),
    (r"by\s+llm\s*[;(]", "by llm"),
    (r"with\s+entry", "with entry"),
    (r"with\s+exit", "with exit"),
    (r"`root\s+entry", "root entry"),
    (r"\bspawn\b", "spawn"),
    (r"import\s+from\s+\w+\s*\{", "import from module { }"),
    (r"\bhas\s+\w+\s*:", "has x: type"),
    (r"\bnode\s+\w+", "node definition"),
    (r"\bwalker\s+\w+", "walker definition"),
    (r"\bedge\s+\w+", "edge definition"),
    (r"\bobj\s+\w+", "obj definition"),
    (r"\bcan\s+\w+", "ability definition"),
    (r"file\.open", "file.open"),
    (r"json\.dumps", "json.dumps"),
    (r"json\.loads", "json.loads"),
    (r"\basync\b", "async"),
    (r"\bawait\b", "await"),
    (r"\breport\b", "report"),
    (r"\bvisit\b", "visit"),
    (r"\bhere\b", "here keyword"),
    (r"\bself\b", "self keyword"),
    (r"\bprops\b", "props keyword"),
    (r"\bcl\s*\{", "client block"),
    (r"\bsv\s*\{", "server block"),
    (r"<[A-Z]\w*", "JSX element"),
    (r"/>", "JSX self-closing"),
    (r"\buseState\b", "React useState"),
    (r"\buseEffect\b", "React useEffect"),
    (r"\bcase\s+\w+\s*:", "match case with colon"),
    (r"lambda\s+\w+\s*:", "lambda expression"),
];

/// Patterns that must appear somewhere in the final document.
pub const REQUIRED_PATTERNS: &[&str] = &[
    "edge: ++>",
    "by llm",
    "with entry",
    "spawn",
    "node definition",
    "walker definition",
    "has x: type",
    "typed connect: +>:",
    "typed traversal: ->:",
];

static COMPILED: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    CRITICAL_PATTERNS
        .iter()
        .map(|(pattern, name)| {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("valid regex");
            (re, *name)
        })
        .collect()
});

/// Names of the critical patterns present in `text`.
pub fn find_patterns(text: &str) -> BTreeSet<&'static str> {
    COMPILED
        .iter()
        .filter(|(re, _)| re.is_match(text))
        .map(|(_, name)| *name)
        .collect()
}

/// Critical coverage plus required patterns missing from `text`.
pub(crate) fn check_patterns(text: &str) -> PatternResult {
    let found = find_patterns(text);
    let missing = REQUIRED_PATTERNS
        .iter()
        .filter(|p| !found.contains(*p))
        .map(|p| p.to_string())
        .collect();

    PatternResult {
        found: found.len(),
        total: CRITICAL_PATTERNS.len(),
        missing,
    }
}
