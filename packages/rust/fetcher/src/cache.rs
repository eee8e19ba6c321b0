//! On-disk cache of fetched documents.
//!
//! ```text
//! <cache_dir>/
//! ├── manifest.json
//! ├── raw/<name>.<md|html>
//! └── sanitized/<name>.md
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use llmdocs_shared::fs::{read_json, write_atomic, write_json};
use llmdocs_shared::{Document, LlmDocsError, Result, SourceKind};

const MANIFEST_FILE: &str = "manifest.json";

/// Provenance of one cached document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    name: String,
    url: String,
    size_bytes: usize,
    raw_size_bytes: usize,
    content_hash: String,
    fetched_at: DateTime<Utc>,
}

/// `manifest.json` listing cached documents in source order.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheManifest {
    written_at: DateTime<Utc>,
    documents: Vec<CacheEntry>,
}

fn raw_path(cache_dir: &Path, name: &str, kind: SourceKind) -> PathBuf {
    let ext = match kind {
        SourceKind::Markdown => "md",
        SourceKind::Html => "html",
    };
    cache_dir.join("raw").join(format!("{name}.{ext}"))
}

fn sanitized_path(cache_dir: &Path, name: &str) -> PathBuf {
    cache_dir.join("sanitized").join(format!("{name}.md"))
}

/// Write one raw body next to its sanitized document.
pub(crate) fn write_document(
    cache_dir: &Path,
    doc: &Document,
    raw: &str,
    kind: SourceKind,
) -> Result<()> {
    write_atomic(&raw_path(cache_dir, &doc.name, kind), raw)?;
    write_atomic(&sanitized_path(cache_dir, &doc.name), &doc.content)?;
    debug!(name = %doc.name, "cached document");
    Ok(())
}

/// Record the set of cached documents. Written last so a partial fetch never
/// leaves a manifest pointing at missing files.
pub(crate) fn write_manifest(cache_dir: &Path, docs: &[Document]) -> Result<()> {
    let manifest = CacheManifest {
        written_at: Utc::now(),
        documents: docs
            .iter()
            .map(|d| CacheEntry {
                name: d.name.clone(),
                url: d.url.clone(),
                size_bytes: d.size_bytes,
                raw_size_bytes: d.raw_size_bytes,
                content_hash: d.content_hash.clone(),
                fetched_at: d.fetched_at,
            })
            .collect(),
    };
    write_json(&cache_dir.join(MANIFEST_FILE), &manifest)
}

/// Reload previously fetched documents for a `--skip-fetch` run.
///
/// A missing manifest or sanitized file is a precondition failure.
pub fn load_cached(cache_dir: &Path) -> Result<Vec<Document>> {
    let manifest_path = cache_dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(LlmDocsError::precondition(format!(
            "no fetched documents cached at {} (run without --skip-fetch first)",
            cache_dir.display()
        )));
    }

    let manifest: CacheManifest = read_json(&manifest_path)?;
    let mut docs = Vec::with_capacity(manifest.documents.len());

    for entry in manifest.documents {
        let path = sanitized_path(cache_dir, &entry.name);
        if !path.exists() {
            return Err(LlmDocsError::precondition(format!(
                "cached document {} is missing",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(&path).map_err(|e| LlmDocsError::io(&path, e))?;

        let hash = crate::sha256_hex(&content);
        if hash != entry.content_hash {
            warn!(name = %entry.name, "cached document changed since fetch");
        }

        docs.push(Document {
            name: entry.name,
            url: entry.url,
            size_bytes: content.len(),
            raw_size_bytes: entry.raw_size_bytes,
            content_hash: hash,
            fetched_at: entry.fetched_at,
            content,
        });
    }

    info!(count = docs.len(), dir = %cache_dir.display(), "loaded cached documents");
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("llmdocs-cache-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn doc(name: &str, content: &str) -> Document {
        Document {
            name: name.into(),
            url: format!("https://example.com/{name}.md"),
            content: content.into(),
            size_bytes: content.len(),
            raw_size_bytes: content.len() + 10,
            content_hash: crate::sha256_hex(content),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn roundtrip_preserves_order_and_content() {
        let dir = temp_dir();
        let docs = vec![doc("zeta", "# Z\n"), doc("alpha", "# A\n")];
        for d in &docs {
            write_document(&dir, d, "raw body", SourceKind::Markdown).unwrap();
        }
        write_manifest(&dir, &docs).unwrap();

        let loaded = load_cached(&dir).unwrap();
        assert_eq!(loaded, docs);
        assert!(dir.join("raw").join("zeta.md").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_manifest_is_precondition_failure() {
        let dir = temp_dir();
        let err = load_cached(&dir).unwrap_err();
        assert!(matches!(err, LlmDocsError::Precondition(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_sanitized_file_is_precondition_failure() {
        let dir = temp_dir();
        let docs = vec![doc("gone", "# G\n")];
        write_manifest(&dir, &docs).unwrap();
        let err = load_cached(&dir).unwrap_err();
        assert!(err.to_string().contains("missing"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
