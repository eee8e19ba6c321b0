//! Selection, classification, and preparation of code blocks for the strict
//! check.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use llmdocs_markdown::FencedBlock;

/// Info-string words marking a block as an intentionally invalid example.
const WRONG_INFO_WORDS: &[&str] = &["wrong", "invalid", "bad", "error"];

/// First-line comment prefixes marking an intentionally invalid example.
const WRONG_COMMENT_PREFIXES: &[&str] = &["WRONG", "INVALID", "✗"];

const FRAGMENT_MARKERS: &[&str] = &["...", "/* ... */", "...}", "{..."];

static TOPLEVEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:node|walker|edge|obj|enum|class|async\s+walker|def|async\s+def|can|import|glob|test|include|with\s+entry)\b",
    )
    .expect("valid regex")
});

static DECL_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:node|walker|edge|obj|enum|class|async\s+walker|def|async\s+def|can|import|glob|test|include)\b",
    )
    .expect("valid regex")
});

static ARCHETYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:node|walker|edge|obj|enum|class)\s+(\w+)").expect("valid regex")
});

static STANDALONE_EXPR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[[-<>:!\w\s,()?.]+\]\s*$").expect("valid regex")
});

static TYPE_REF_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\+>:\s*(\w+)\s*\(",
        r"\+\+>\s*(\w+)\s*\(",
        r"<\+:\s*(\w+)\s*\(",
        r"\[->\s*:\s*(\w+)\s*:\s*->",
        r"\[-->\]\s*\(\?\s*:\s*(\w+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// A language-tagged block eligible for the strict check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CheckBlock {
    /// 1-based position among all fenced blocks in the document.
    pub number: usize,
    /// Document line of the first code line.
    pub line: usize,
    /// Trimmed block body.
    pub code: String,
    /// Marked as an intentionally invalid example.
    pub wrong: bool,
}

/// Whether a fenced block demonstrates invalid code on purpose.
pub(crate) fn is_marked_wrong(block: &FencedBlock) -> bool {
    if block
        .attributes()
        .any(|w| WRONG_INFO_WORDS.iter().any(|m| w.eq_ignore_ascii_case(m)))
    {
        return true;
    }

    let Some(first) = block.body.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return false;
    };
    let comment = first
        .strip_prefix('#')
        .or_else(|| first.strip_prefix("//"))
        .map(str::trim_start);
    comment.is_some_and(|c| WRONG_COMMENT_PREFIXES.iter().any(|p| c.starts_with(p)))
}

/// Language-tagged blocks worth considering, in document order.
///
/// Blocks of ten characters or fewer and blocks opening with a `//` comment
/// are ignored entirely and do not count towards any total.
pub(crate) fn select_blocks<'a>(
    blocks: &'a [FencedBlock],
    tags: &'a [String],
) -> impl Iterator<Item = CheckBlock> + 'a {
    blocks.iter().filter(|b| b.is_tagged(tags)).filter_map(|b| {
        let code = b.body.trim();
        let wrong = is_marked_wrong(b);
        if !wrong && (code.len() <= 10 || code.starts_with("//")) {
            return None;
        }
        Some(CheckBlock {
            number: b.index + 1,
            line: b.first_code_line(),
            code: code.to_string(),
            wrong,
        })
    })
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How a block is treated by the strict check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockClass {
    /// Declares archetypes, or an entry block with top-level functions.
    Complete,
    /// Top-level declarations only.
    Declarations,
    /// Bare statements that need an entry block around them.
    Statements,
    /// Client-side UI code.
    ClientSide,
    /// Internal API notation.
    ApiNotation,
    /// Partial snippet or syntax reference list.
    Fragment,
}

impl BlockClass {
    /// Whether blocks of this class are sent to the checker.
    pub fn is_checkable(self) -> bool {
        !matches!(self, Self::ClientSide | Self::ApiNotation | Self::Fragment)
    }
}

pub(crate) fn classify(code: &str) -> BlockClass {
    static CLIENT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\bcl\s*\{|\bsv\s+import\b").expect("valid regex"));
    static JSX_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[A-Z]\w+[\s/>]").expect("valid regex"));
    static NODE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\bnode\s+\w+").expect("valid regex"));
    static CORE_ARCHETYPE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b(?:node|walker|obj)\s+\w+").expect("valid regex"));
    static ENTRY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"with\s+entry").expect("valid regex"));
    static TOPLEVEL_DEF_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^\s*(?:def|can)\s+\w+").expect("valid regex"));

    let non_blank: Vec<&str> = code
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("//"))
        .collect();

    let has_archetype = ARCHETYPE_RE.is_match(code);

    // One-liners are fragments unless they hold a whole declaration.
    if non_blank.len() < 2 && !has_archetype {
        return BlockClass::Fragment;
    }
    if FRAGMENT_MARKERS.iter().any(|m| code.contains(m)) {
        return BlockClass::Fragment;
    }

    if CLIENT_RE.is_match(code) || (JSX_RE.is_match(code) && !NODE_RE.is_match(code)) {
        return BlockClass::ClientSide;
    }
    if code.contains("__jac__.") && !CORE_ARCHETYPE_RE.is_match(code) {
        return BlockClass::ApiNotation;
    }

    let standalone = non_blank
        .iter()
        .filter(|l| {
            STANDALONE_EXPR_RE.is_match(l)
                || (!l.ends_with(';')
                    && !l.ends_with('{')
                    && !l.ends_with('}')
                    && !TOPLEVEL_RE.is_match(l))
        })
        .count();
    if non_blank.len() >= 5 && standalone * 2 > non_blank.len() {
        return BlockClass::Fragment;
    }

    let has_toplevel_def = TOPLEVEL_DEF_RE.is_match(code);
    if has_archetype || (ENTRY_RE.is_match(code) && has_toplevel_def) {
        return BlockClass::Complete;
    }

    if non_blank.iter().any(|l| !TOPLEVEL_RE.is_match(l)) {
        BlockClass::Statements
    } else {
        BlockClass::Declarations
    }
}

// ---------------------------------------------------------------------------
// Preparation
// ---------------------------------------------------------------------------

/// Drop a trailing `#` comment that sits outside string literals.
pub(crate) fn strip_inline_comment(line: &str) -> &str {
    let mut in_str: Option<char> = None;
    let mut prev: Option<char> = None;

    for (i, ch) in line.char_indices() {
        match ch {
            '"' | '\'' if prev != Some('\\') => match in_str {
                None => in_str = Some(ch),
                Some(q) if q == ch => in_str = None,
                Some(_) => {}
            },
            '#' if in_str.is_none() => return line[..i].trim_end(),
            _ => {}
        }
        prev = Some(ch);
    }
    line
}

/// Make a snippet checkable on its own.
///
/// Inline comments are removed, stub `node` archetypes are generated for
/// referenced but undeclared types, and bare statements are moved into a
/// `with entry { ... }` block after the declarations.
pub(crate) fn prepare_for_check(code: &str) -> String {
    let lines: Vec<&str> = code.lines().map(strip_inline_comment).collect();
    let cleaned = lines.join("\n");
    let stubs = type_stubs(&cleaned);

    let mut declarations: Vec<&str> = Vec::new();
    let mut statements: Vec<&str> = Vec::new();
    let mut depth: i64 = 0;
    let mut in_declaration = false;

    for &line in &lines {
        let stripped = line.trim();
        let delta = brace_delta(stripped);

        if in_declaration {
            declarations.push(line);
            depth += delta;
            if depth <= 0 {
                in_declaration = false;
                depth = 0;
            }
            continue;
        }

        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        if DECL_START_RE.is_match(stripped) {
            declarations.push(line);
            depth = delta;
            in_declaration = depth > 0;
        } else {
            statements.push(line);
        }
    }

    if statements.is_empty() {
        if stubs.is_empty() {
            return cleaned;
        }
        let mut parts = stubs;
        parts.extend(declarations.iter().map(|l| l.to_string()));
        return parts.join("\n");
    }

    let mut parts = stubs;
    parts.extend(declarations.iter().map(|l| l.to_string()));
    parts.push("with entry {".into());
    parts.extend(statements.iter().map(|s| format!("    {s}")));
    parts.push("}".into());
    parts.join("\n")
}

/// Stub archetypes for capitalized types referenced by connect or
/// traversal syntax but never declared.
fn type_stubs(code: &str) -> Vec<String> {
    let mut defined: HashSet<&str> = ARCHETYPE_RE
        .captures_iter(code)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    let mut stubs = Vec::new();
    for re in TYPE_REF_RES.iter() {
        for caps in re.captures_iter(code) {
            let Some(name) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if name.starts_with(|c: char| c.is_ascii_uppercase()) && defined.insert(name) {
                stubs.push(format!("node {name} {{ has val: int = 0; }}"));
            }
        }
    }
    stubs
}

fn brace_delta(line: &str) -> i64 {
    let opens = line.matches('{').count() as i64;
    let closes = line.matches('}').count() as i64;
    opens - closes
}
