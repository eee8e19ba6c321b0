//! Pattern-based declaration scanning for Jac code blocks.
//!
//! Archetypes (`node`, `edge`, `walker`, `obj`, `class`, `enum`, `test`) are
//! located by keyword and their bodies delimited by brace matching. Inside a
//! body only the API surface is kept: `has` attributes, `can` abilities, and
//! `def` methods. Top-level `def` functions and `glob` globals outside any
//! archetype become their own definitions.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use llmdocs_shared::RecordKind;

use crate::scanner::{docstring_before, matching_brace};

static ARCHETYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(node|edge|walker|obj|object|class|enum|test)\s+(\w+)(?:\s*<[^>]*>)?(?:\s*\(\s*([\w.]+)\s*\))?\s*\{",
    )
    .expect("valid regex")
});

static HAS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bhas\s+(\w+)\s*(?::\s*([^=;]+?))?(?:\s*=\s*([^;]+?))?\s*;").expect("valid regex")
});

static CAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(async\s+)?\bcan\s+(\w+)(?:\s*\(([^)]*)\))?(?:\s*->\s*([^\s{]+))?(?:\s+(with\s+[^{;]+))?\s*[{;]",
    )
    .expect("valid regex")
});

static DEF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(async\s+)?\bdef\s+(\w+)(?:\s*\(([^)]*)\))?(?:\s*->\s*([^\s{;]+))?\s*[{;]")
        .expect("valid regex")
});

static GLOB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bglob\s+(\w+)\s*(?::\s*([^=;]+?))?(?:\s*=\s*([^;]+?))?\s*;").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Definition model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct Attribute {
    name: String,
    type_hint: Option<String>,
    default: Option<String>,
}

impl Attribute {
    fn from_caps(caps: &Captures) -> Self {
        Self {
            name: caps[1].to_string(),
            type_hint: trimmed(caps.get(2)),
            default: trimmed(caps.get(3)),
        }
    }

    fn render(&self, keyword: &str) -> String {
        let mut sig = format!("{keyword} {}", self.name);
        if let Some(t) = &self.type_hint {
            sig.push_str(&format!(": {t}"));
        }
        if let Some(d) = &self.default {
            sig.push_str(&format!(" = {d}"));
        }
        sig.push(';');
        sig
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Callable {
    keyword: &'static str,
    name: String,
    params: Option<String>,
    return_type: Option<String>,
    trigger: Option<String>,
    is_async: bool,
}

impl Callable {
    fn ability(caps: &Captures) -> Self {
        Self {
            keyword: "can",
            name: caps[2].to_string(),
            params: trimmed(caps.get(3)),
            return_type: trimmed(caps.get(4)),
            trigger: trimmed(caps.get(5)),
            is_async: caps.get(1).is_some(),
        }
    }

    fn function(caps: &Captures) -> Self {
        Self {
            keyword: "def",
            name: caps[2].to_string(),
            // `def f()` keeps its empty parens.
            params: caps.get(3).map(|m| m.as_str().trim().to_string()),
            return_type: trimmed(caps.get(4)),
            trigger: None,
            is_async: caps.get(1).is_some(),
        }
    }

    fn render(&self) -> String {
        let mut sig = String::new();
        if self.is_async {
            sig.push_str("async ");
        }
        sig.push_str(self.keyword);
        sig.push(' ');
        sig.push_str(&self.name);
        if let Some(p) = &self.params {
            sig.push_str(&format!("({p})"));
        }
        if let Some(r) = &self.return_type {
            sig.push_str(&format!(" -> {r}"));
        }
        if let Some(t) = &self.trigger {
            sig.push_str(&format!(" {t}"));
        }
        sig.push(';');
        sig
    }
}

/// One declaration found in a code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Definition {
    pub kind: RecordKind,
    pub name: String,
    /// Byte offset of the declaration within its block.
    pub offset: usize,
    /// Source text of the whole declaration.
    pub text: String,
    parent: Option<String>,
    docstring: Option<String>,
    attributes: Vec<Attribute>,
    callables: Vec<Callable>,
}

impl Definition {
    /// Skeleton with bodies removed.
    pub fn skeleton(&self) -> String {
        let mut lines = Vec::new();
        if let Some(doc) = &self.docstring {
            lines.push(format!("# {doc}"));
        }

        match self.kind {
            RecordKind::Function | RecordKind::Ability => {
                lines.extend(self.callables.iter().map(Callable::render));
            }
            RecordKind::Global => {
                lines.extend(self.attributes.iter().map(|a| a.render("glob")));
            }
            _ => {
                let mut header = format!("{} {}", self.kind.keyword(), self.name);
                if let Some(parent) = &self.parent {
                    header.push_str(&format!("({parent})"));
                }
                header.push_str(" {");
                lines.push(header);
                lines.extend(self.attributes.iter().map(|a| format!("    {}", a.render("has"))));
                lines.extend(self.callables.iter().map(|c| format!("    {}", c.render())));
                lines.push("}".into());
            }
        }

        lines.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// All declarations in `code`, ordered by position.
pub(crate) fn scan_definitions(code: &str) -> Vec<Definition> {
    let mut defs = Vec::new();
    let mut covered: Vec<(usize, usize)> = Vec::new();

    for caps in ARCHETYPE_RE.captures_iter(code) {
        let Some(whole) = caps.get(0) else { continue };
        let open = whole.end() - 1;
        let Some(close) = matching_brace(code, open) else {
            continue;
        };
        // Nested archetypes are part of their parent's text.
        if covered.iter().any(|&(s, e)| s <= whole.start() && whole.start() < e) {
            continue;
        }
        covered.push((whole.start(), close + 1));

        let body = &code[open + 1..close];
        defs.push(Definition {
            kind: archetype_kind(&caps[1]),
            name: caps[2].to_string(),
            offset: whole.start(),
            text: code[whole.start()..=close].to_string(),
            parent: caps.get(3).map(|m| m.as_str().to_string()),
            docstring: docstring_before(code, whole.start()),
            attributes: HAS_RE.captures_iter(body).map(|c| Attribute::from_caps(&c)).collect(),
            callables: CAN_RE
                .captures_iter(body)
                .map(|c| Callable::ability(&c))
                .chain(DEF_RE.captures_iter(body).map(|c| Callable::function(&c)))
                .collect(),
        });
    }

    let is_covered = |pos: usize| covered.iter().any(|&(s, e)| s <= pos && pos < e);

    for (re, kind) in [(&*DEF_RE, RecordKind::Function), (&*CAN_RE, RecordKind::Ability)] {
        for caps in re.captures_iter(code) {
            let Some(whole) = caps.get(0) else { continue };
            if is_covered(whole.start()) {
                continue;
            }
            let end = if whole.as_str().ends_with('{') {
                matching_brace(code, whole.end() - 1).map_or(whole.end(), |c| c + 1)
            } else {
                whole.end()
            };
            let callable = match kind {
                RecordKind::Ability => Callable::ability(&caps),
                _ => Callable::function(&caps),
            };
            defs.push(Definition {
                kind,
                name: callable.name.clone(),
                offset: whole.start(),
                text: code[whole.start()..end].to_string(),
                parent: None,
                docstring: docstring_before(code, whole.start()),
                attributes: Vec::new(),
                callables: vec![callable],
            });
        }
    }

    for caps in GLOB_RE.captures_iter(code) {
        let Some(whole) = caps.get(0) else { continue };
        if is_covered(whole.start()) {
            continue;
        }
        let attr = Attribute::from_caps(&caps);
        defs.push(Definition {
            kind: RecordKind::Global,
            name: attr.name.clone(),
            offset: whole.start(),
            text: whole.as_str().to_string(),
            parent: None,
            docstring: docstring_before(code, whole.start()),
            attributes: vec![attr],
            callables: Vec::new(),
        });
    }

    defs.sort_by_key(|d| d.offset);
    defs
}

fn archetype_kind(keyword: &str) -> RecordKind {
    match keyword {
        "node" => RecordKind::Node,
        "edge" => RecordKind::Edge,
        "walker" => RecordKind::Walker,
        "class" => RecordKind::Class,
        "enum" => RecordKind::Enum,
        "test" => RecordKind::Test,
        _ => RecordKind::Obj,
    }
}

fn trimmed(m: Option<regex::Match>) -> Option<String> {
    m.map(|m| m.as_str().trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_skeleton_keeps_surface_only() {
        let code = "# A person.\nnode Person {\n    has name: str;\n    has age: int = 0;\n    can greet with Visitor entry {\n        print(\"hi\");\n    }\n}\n";
        let defs = scan_definitions(code);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].kind, RecordKind::Node);
        assert_eq!(
            defs[0].skeleton(),
            "# A person.\nnode Person {\n    has name: str;\n    has age: int = 0;\n    can greet with Visitor entry;\n}"
        );
        assert!(defs[0].text.ends_with('}'));
    }

    #[test]
    fn inheritance_and_methods() {
        let code = "obj Dog(Animal) {\n    has breed: str;\n    def bark() -> str {\n        return \"woof\";\n    }\n}";
        let defs = scan_definitions(code);
        assert_eq!(
            defs[0].skeleton(),
            "obj Dog(Animal) {\n    has breed: str;\n    def bark() -> str;\n}"
        );
    }

    #[test]
    fn top_level_functions_and_globals_in_order() {
        let code = "glob counter: int = 0;\n\ndef add(a: int, b: int) -> int {\n    return a + b;\n}\n\nwalker W {\n    def helper();\n}\n";
        let defs = scan_definitions(code);
        let kinds: Vec<_> = defs.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![RecordKind::Global, RecordKind::Function, RecordKind::Walker]);
        assert_eq!(defs[0].skeleton(), "glob counter: int = 0;");
        assert_eq!(defs[1].skeleton(), "def add(a: int, b: int) -> int;");
        assert!(defs[1].text.contains("return a + b;"));
    }

    #[test]
    fn nested_archetype_not_duplicated() {
        let code = "class Outer {\n    obj Inner { has x: int; }\n}";
        let defs = scan_definitions(code);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "Outer");
    }

    #[test]
    fn async_walker_ability() {
        let code = "walker Crawl {\n    async can run with `root entry { visit [-->]; }\n}";
        let defs = scan_definitions(code);
        assert_eq!(
            defs[0].skeleton(),
            "walker Crawl {\n    async can run with `root entry;\n}"
        );
    }
}
