//! Retrieval of upstream documentation sources.
//!
//! Each configured source is fetched over HTTP, sanitized into Markdown, and
//! written to the on-disk cache so a later run can skip fetching entirely.
//! A failing required source aborts the fetch; optional sources are logged
//! and skipped.

mod cache;

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use llmdocs_markdown::{SanitizeOptions, sanitize_source};
use llmdocs_shared::{Document, LlmDocsError, Result, SanitizeConfig, SourceConfig};

pub use cache::load_cached;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum response size we accept (20 MB).
const MAX_RESPONSE_SIZE: u64 = 20 * 1024 * 1024;

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("llmdocs/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Options and outcome
// ---------------------------------------------------------------------------

/// Configuration for one fetch pass.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout for each HTTP request in seconds.
    pub timeout_secs: u64,
    /// Sanitization rules applied to every source.
    pub sanitize: SanitizeConfig,
    /// Cache directory; `None` disables cache writes.
    pub cache_dir: Option<PathBuf>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            sanitize: SanitizeConfig::default(),
            cache_dir: None,
        }
    }
}

/// Result of fetching every configured source.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Sanitized documents in configuration order.
    pub documents: Vec<Document>,
    /// Optional sources that failed or were too small, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl FetchOutcome {
    /// Total size of the raw response bodies.
    pub fn raw_bytes(&self) -> usize {
        self.documents.iter().map(|d| d.raw_size_bytes).sum()
    }

    /// Total size of the sanitized documents.
    pub fn sanitized_bytes(&self) -> usize {
        self.documents.iter().map(|d| d.size_bytes).sum()
    }
}

// ---------------------------------------------------------------------------
// Main entry points
// ---------------------------------------------------------------------------

/// Fetch and sanitize every source, in order.
///
/// `on_document` is called after each source that produced a document, so
/// callers can report progress as it happens.
#[instrument(skip_all, fields(sources = sources.len()))]
pub async fn fetch_sources(
    sources: &[SourceConfig],
    opts: &FetchOptions,
    mut on_document: impl FnMut(&Document),
) -> Result<FetchOutcome> {
    let client = build_client(opts.timeout_secs)?;
    let mut outcome = FetchOutcome::default();

    for source in sources {
        match fetch_one(&client, source, opts).await {
            Ok(doc) => {
                on_document(&doc);
                outcome.documents.push(doc);
            }
            Err(e) if source.required => {
                return Err(LlmDocsError::Fetch(format!(
                    "required source {}: {e}",
                    source.name
                )));
            }
            Err(e) => {
                warn!(source = %source.name, error = %e, "optional source skipped");
                outcome.skipped.push((source.name.clone(), e.to_string()));
            }
        }
    }

    if let Some(dir) = &opts.cache_dir {
        cache::write_manifest(dir, &outcome.documents)?;
    }

    info!(
        documents = outcome.documents.len(),
        skipped = outcome.skipped.len(),
        raw_bytes = outcome.raw_bytes(),
        sanitized_bytes = outcome.sanitized_bytes(),
        "fetch complete"
    );

    Ok(outcome)
}

/// Look up the upstream language version as `major.minor`.
///
/// The URL must serve a `pyproject.toml`-style file with a
/// `version = "x.y.z"` line.
#[instrument(skip_all, fields(url = %url))]
pub async fn fetch_language_version(url: &str, timeout_secs: u64) -> Result<String> {
    static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?m)^\s*version\s*=\s*"(\d+)\.(\d+)(?:\.[^"]*)?""#).expect("valid regex")
    });

    let client = build_client(timeout_secs)?;
    let body = fetch_text(&client, url).await?;

    let caps = VERSION_RE
        .captures(&body)
        .ok_or_else(|| LlmDocsError::Fetch(format!("{url}: no version line found")))?;
    let version = format!("{}.{}", &caps[1], &caps[2]);

    debug!(%version, "upstream version");
    Ok(version)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch, sanitize, and cache one source.
async fn fetch_one(client: &Client, source: &SourceConfig, opts: &FetchOptions) -> Result<Document> {
    info!(source = %source.name, url = %source.url, "fetching");
    let raw = fetch_text(client, &source.url).await?;

    let sanitize_opts = SanitizeOptions {
        source_url: Some(source.url.clone()),
        excluded_sections: opts.sanitize.excluded_sections.clone(),
    };
    let sanitized = sanitize_source(&raw, source.kind, &sanitize_opts)?;

    let content_chars = sanitized.markdown.trim().chars().count();
    if content_chars < opts.sanitize.min_content_chars {
        return Err(LlmDocsError::Fetch(format!(
            "{}: only {content_chars} chars after sanitization (min {})",
            source.url, opts.sanitize.min_content_chars
        )));
    }

    let doc = Document {
        name: source.name.clone(),
        url: source.url.clone(),
        size_bytes: sanitized.markdown.len(),
        raw_size_bytes: raw.len(),
        content_hash: sha256_hex(&sanitized.markdown),
        fetched_at: Utc::now(),
        content: sanitized.markdown,
    };

    if let Some(dir) = &opts.cache_dir {
        cache::write_document(dir, &doc, &raw, source.kind)?;
    }

    debug!(
        source = %doc.name,
        raw = doc.raw_size_bytes,
        sanitized = doc.size_bytes,
        removed = sanitized.removed_sections.len(),
        "source sanitized"
    );
    Ok(doc)
}

/// Build a reqwest client with appropriate settings.
fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmDocsError::Fetch(format!("failed to build HTTP client: {e}")))
}

/// GET a URL and return its body, rejecting non-success statuses.
async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LlmDocsError::Fetch(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LlmDocsError::Fetch(format!("{url}: HTTP {status}")));
    }

    if let Some(len) = response.content_length() {
        if len > MAX_RESPONSE_SIZE {
            return Err(LlmDocsError::Fetch(format!(
                "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
            )));
        }
    }

    response
        .text()
        .await
        .map_err(|e| LlmDocsError::Fetch(format!("{url}: failed to read body: {e}")))
}

/// Hex-encoded SHA-256 of a string.
pub(crate) fn sha256_hex(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmdocs_shared::SourceKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const README: &str = "# Jac\n\n\
        Jac is a graph-native language built around nodes, edges, and walkers.\n\n\
        ```jac\nnode Person { has name: str; }\n```\n\n\
        Walkers traverse the graph and perform work at each visited node.\n\n\
        ## Contributing\n\nOpen a pull request.\n";

    fn source(server: &MockServer, name: &str, required: bool) -> SourceConfig {
        SourceConfig {
            name: name.into(),
            url: format!("{}/{name}.md", server.uri()),
            required,
            kind: SourceKind::Markdown,
        }
    }

    fn opts(cache_dir: Option<PathBuf>) -> FetchOptions {
        FetchOptions {
            timeout_secs: 5,
            sanitize: SanitizeConfig {
                min_content_chars: 50,
                ..SanitizeConfig::default()
            },
            cache_dir,
        }
    }

    async fn serve(server: &MockServer, route: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    #[test]
    fn sha256_is_hex_encoded() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn fetches_and_sanitizes_in_order() {
        let server = MockServer::start().await;
        serve(&server, "/b.md", 200, README).await;
        serve(&server, "/a.md", 200, README).await;

        let sources = vec![source(&server, "b", true), source(&server, "a", true)];
        let mut seen = Vec::new();
        let outcome = fetch_sources(&sources, &opts(None), |d| seen.push(d.name.clone()))
            .await
            .unwrap();

        let names: Vec<_> = outcome.documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(seen, vec!["b", "a"]);

        let doc = &outcome.documents[0];
        assert!(!doc.content.contains("Open a pull request"));
        assert!(doc.size_bytes < doc.raw_size_bytes);
        assert_eq!(doc.content_hash, sha256_hex(&doc.content));
    }

    #[tokio::test]
    async fn required_source_failure_is_fatal() {
        let server = MockServer::start().await;
        serve(&server, "/core.md", 404, "").await;

        let err = fetch_sources(&[source(&server, "core", true)], &opts(None), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, LlmDocsError::Fetch(_)));
        assert!(err.to_string().contains("core"));
    }

    #[tokio::test]
    async fn optional_source_failure_is_skipped() {
        let server = MockServer::start().await;
        serve(&server, "/core.md", 200, README).await;
        serve(&server, "/extra.md", 500, "").await;

        let sources = vec![source(&server, "core", true), source(&server, "extra", false)];
        let outcome = fetch_sources(&sources, &opts(None), |_| {}).await.unwrap();

        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].0, "extra");
    }

    #[tokio::test]
    async fn tiny_document_is_rejected() {
        let server = MockServer::start().await;
        serve(&server, "/stub.md", 200, "# Stub\n").await;

        let outcome = fetch_sources(&[source(&server, "stub", false)], &opts(None), |_| {})
            .await
            .unwrap();
        assert!(outcome.documents.is_empty());
        assert!(outcome.skipped[0].1.contains("chars after sanitization"));
    }

    #[tokio::test]
    async fn cache_written_and_reloadable() {
        let server = MockServer::start().await;
        serve(&server, "/core.md", 200, README).await;

        let dir = std::env::temp_dir().join(format!("llmdocs-fetch-test-{}", uuid::Uuid::now_v7()));
        let outcome = fetch_sources(&[source(&server, "core", true)], &opts(Some(dir.clone())), |_| {})
            .await
            .unwrap();

        assert!(dir.join("raw").join("core.md").exists());
        assert!(dir.join("sanitized").join("core.md").exists());
        let cached = load_cached(&dir).unwrap();
        assert_eq!(cached, outcome.documents);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn language_version_is_major_minor() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/pyproject.toml",
            200,
            "[project]\nname = \"jaclang\"\nversion = \"0.8.4\"\n",
        )
        .await;

        let url = format!("{}/pyproject.toml", server.uri());
        assert_eq!(fetch_language_version(&url, 5).await.unwrap(), "0.8");
    }

    #[tokio::test]
    async fn language_version_missing_line() {
        let server = MockServer::start().await;
        serve(&server, "/pyproject.toml", 200, "[project]\nname = \"jaclang\"\n").await;

        let url = format!("{}/pyproject.toml", server.uri());
        assert!(fetch_language_version(&url, 5).await.is_err());
    }
}
