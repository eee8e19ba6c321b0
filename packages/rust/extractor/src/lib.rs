//! Deterministic signature and example extraction.
//!
//! Walks the fenced code blocks of each fetched document, finds declarations,
//! and turns them into ordered [`Record`]s: a skeleton signature plus, while
//! the per-kind budget lasts, the full declaration as a canonical example.
//! No network or LLM calls happen here; identical input yields identical
//! output.

mod scanner;
mod signatures;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use llmdocs_markdown::scan_fences;
use llmdocs_shared::fs::{read_json, write_json};
use llmdocs_shared::{
    Document, ExtractConfig, ExtractedSet, LlmDocsError, Record, RecordKind, Result,
};

use crate::scanner::normalize_ws;

/// Language keywords tracked across code blocks.
const KEYWORDS: &[&str] = &[
    "node", "edge", "walker", "obj", "class", "enum", "test", "has", "can", "def", "glob",
    "with", "entry", "exit", "visit", "spawn", "here", "visitor", "root", "disengage",
    "report", "skip", "import", "include", "async", "by", "llm", "impl", "sem", "lambda",
    "match", "case", "del", "assert", "static", "override", "abs", "priv", "pub", "protect",
];

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract records from every document, in document order.
///
/// A malformed document is logged and listed in `skipped_documents`; it never
/// aborts the batch.
#[instrument(skip_all, fields(documents = docs.len()))]
pub fn extract(docs: &[Document], config: &ExtractConfig) -> ExtractedSet {
    let mut set = ExtractedSet::default();
    let mut examples_per_kind: BTreeMap<RecordKind, usize> = BTreeMap::new();

    for doc in docs {
        match extract_document(doc, config, &mut examples_per_kind) {
            Ok((records, keywords)) => {
                debug!(doc = %doc.name, records = records.len(), "document extracted");
                set.records.extend(records);
                set.keywords.extend(keywords);
                set.documents += 1;
            }
            Err(e) => {
                warn!(doc = %doc.name, error = %e, "skipping malformed document");
                set.skipped_documents.push(doc.name.clone());
            }
        }
    }

    info!(
        records = set.records.len(),
        examples = set.example_count(),
        keywords = set.keywords.len(),
        skipped = set.skipped_documents.len(),
        "extraction complete"
    );
    set
}

/// Records and keywords for a single document.
fn extract_document(
    doc: &Document,
    config: &ExtractConfig,
    examples_per_kind: &mut BTreeMap<RecordKind, usize>,
) -> Result<(Vec<Record>, BTreeSet<String>)> {
    let scan = scan_fences(&doc.content);
    if let Some(line) = scan.unterminated_at {
        return Err(LlmDocsError::extraction(
            &doc.name,
            format!("unbalanced code fence opened at line {line}"),
        ));
    }

    let mut records = Vec::new();
    let mut keywords = BTreeSet::new();

    for block in scan.blocks.iter().filter(|b| b.is_tagged(&config.language_tags)) {
        keywords.extend(keywords_in(&block.body));

        for def in signatures::scan_definitions(&block.body) {
            let used = examples_per_kind.entry(def.kind).or_default();
            let text = def.text.trim();
            let example = (*used < config.max_examples_per_kind
                && text.len() <= config.max_example_chars)
                .then(|| {
                    *used += 1;
                    text.to_string()
                });

            records.push(Record {
                signature: def.skeleton(),
                name: def.name,
                kind: def.kind,
                example,
                source: doc.name.clone(),
            });
        }
    }

    Ok((records, keywords))
}

fn keywords_in(code: &str) -> impl Iterator<Item = String> + '_ {
    static WORD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b[a-z_]+\b").expect("valid regex"));

    WORD_RE
        .find_iter(code)
        .map(|m| m.as_str())
        .filter(|w| KEYWORDS.contains(w))
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Prompt rendering
// ---------------------------------------------------------------------------

/// Render records as the body of the assembly prompt.
///
/// Records are grouped by kind in first-seen order; within a group, records
/// whose normalized signature was already rendered are dropped.
pub fn format_for_prompt(set: &ExtractedSet) -> String {
    let mut kind_order: Vec<RecordKind> = Vec::new();
    let mut groups: BTreeMap<RecordKind, Vec<&Record>> = BTreeMap::new();
    let mut seen: HashSet<(RecordKind, String)> = HashSet::new();

    for record in &set.records {
        if !seen.insert((record.kind, normalize_ws(&record.signature))) {
            continue;
        }
        if !groups.contains_key(&record.kind) {
            kind_order.push(record.kind);
        }
        groups.entry(record.kind).or_default().push(record);
    }

    let mut out = String::new();
    if !set.keywords.is_empty() {
        let keywords: Vec<&str> = set.keywords.iter().map(String::as_str).collect();
        out.push_str(&format!("Keywords: {}\n\n", keywords.join(", ")));
    }

    for kind in kind_order {
        let records = &groups[&kind];
        out.push_str(&format!("## {}\n\n```jac\n", kind.title()));
        let signatures: Vec<&str> = records.iter().map(|r| r.signature.as_str()).collect();
        out.push_str(&signatures.join("\n\n"));
        out.push_str("\n```\n\n");

        let examples: Vec<&Record> = records.iter().copied().filter(|r| r.example.is_some()).collect();
        if !examples.is_empty() {
            out.push_str("### Examples\n\n");
            for record in examples {
                if let Some(example) = &record.example {
                    out.push_str(&format!(
                        "From `{}`:\n\n```jac\n{example}\n```\n\n",
                        record.source
                    ));
                }
            }
        }
    }

    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Persist an extracted set for a later `--skip-extract` run.
pub fn save_records(path: &Path, set: &ExtractedSet) -> Result<()> {
    write_json(path, set)
}

/// Load a previously persisted extracted set.
pub fn load_records(path: &Path) -> Result<ExtractedSet> {
    if !path.exists() {
        return Err(LlmDocsError::precondition(format!(
            "no extracted records at {} (run without --skip-extract first)",
            path.display()
        )));
    }
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, content: &str) -> Document {
        Document {
            name: name.into(),
            url: format!("https://example.com/{name}.md"),
            content: content.into(),
            size_bytes: content.len(),
            raw_size_bytes: content.len(),
            content_hash: String::new(),
            fetched_at: chrono::Utc::now(),
        }
    }

    const GUIDE: &str = "# Guide\n\n\
        ```jac\nnode Person {\n    has name: str;\n}\n```\n\n\
        ```python\nclass NotJac: pass\n```\n\n\
        ```jac\nwalker Greeter {\n    can greet with Person entry {\n        report here.name;\n    }\n}\n\nwith entry {\n    root spawn Greeter();\n}\n```\n";

    #[test]
    fn extracts_in_source_order() {
        let set = extract(&[doc("guide", GUIDE)], &ExtractConfig::default());
        let names: Vec<_> = set.records.iter().map(|r| (r.kind, r.name.as_str())).collect();
        assert_eq!(names, vec![(RecordKind::Node, "Person"), (RecordKind::Walker, "Greeter")]);
        assert!(set.records.iter().all(|r| r.source == "guide"));
        assert!(set.keywords.contains("spawn"));
        assert!(set.keywords.contains("with"));
        assert!(!set.keywords.contains("pass"));
        assert_eq!(set.documents, 1);
    }

    #[test]
    fn extraction_is_order_stable() {
        let docs = [doc("a", GUIDE), doc("b", GUIDE)];
        let config = ExtractConfig::default();
        assert_eq!(extract(&docs, &config), extract(&docs, &config));
    }

    #[test]
    fn malformed_document_is_skipped() {
        let broken = doc("broken", "# Broken\n\n```jac\nnode A {}\n");
        let set = extract(&[broken, doc("guide", GUIDE)], &ExtractConfig::default());
        assert_eq!(set.skipped_documents, vec!["broken"]);
        assert_eq!(set.documents, 1);
        assert_eq!(set.records.len(), 2);
    }

    #[test]
    fn examples_capped_per_kind() {
        let config = ExtractConfig {
            max_examples_per_kind: 1,
            ..ExtractConfig::default()
        };
        let md = "```jac\nnode A { has x: int; }\nnode B { has y: int; }\n```\n";
        let set = extract(&[doc("d", md)], &config);
        assert_eq!(set.records.len(), 2);
        assert!(set.records[0].example.is_some());
        assert!(set.records[1].example.is_none());
    }

    #[test]
    fn oversized_example_kept_as_signature_only() {
        let config = ExtractConfig {
            max_example_chars: 10,
            ..ExtractConfig::default()
        };
        let set = extract(&[doc("d", GUIDE)], &config);
        assert!(set.records.iter().all(|r| r.example.is_none()));
        assert_eq!(set.example_count(), 0);
    }

    #[test]
    fn prompt_groups_and_dedupes() {
        let set = extract(&[doc("a", GUIDE), doc("b", GUIDE)], &ExtractConfig::default());
        let prompt = format_for_prompt(&set);

        let nodes = prompt.find("## Nodes").unwrap();
        let walkers = prompt.find("## Walkers").unwrap();
        assert!(nodes < walkers);
        assert_eq!(prompt.matches("node Person {").count(), 2, "one signature and one example");
        assert!(prompt.starts_with("Keywords: "));
        assert!(prompt.ends_with("```\n"));
    }

    #[test]
    fn records_roundtrip_and_missing_file() {
        let dir = std::env::temp_dir().join(format!("llmdocs-extract-test-{}", uuid::Uuid::now_v7()));
        let path = dir.join("records.json");

        let err = load_records(&path).unwrap_err();
        assert!(matches!(err, LlmDocsError::Precondition(_)));

        let set = extract(&[doc("guide", GUIDE)], &ExtractConfig::default());
        save_records(&path, &set).unwrap();
        assert_eq!(load_records(&path).unwrap(), set);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
