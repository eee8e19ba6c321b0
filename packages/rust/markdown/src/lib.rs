//! Markdown sanitization, HTML-to-Markdown conversion, and fence scanning.
//!
//! Upstream documents arrive either as Markdown or as HTML pages. HTML is
//! reduced to its main content and converted with `htmd`; both then go
//! through the same sanitization passes.

mod cleanup;
pub mod fences;

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use tracing::{debug, instrument};
use url::Url;

use llmdocs_shared::{LlmDocsError, Result, SourceKind};

pub use fences::{FenceScan, FencedBlock, scan_fences};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for sanitizing one upstream document.
#[derive(Debug, Clone, Default)]
pub struct SanitizeOptions {
    /// Source URL used for resolving relative links.
    pub source_url: Option<String>,
    /// Headings whose sections are removed.
    pub excluded_sections: Vec<String>,
}

/// Result of sanitizing a document.
#[derive(Debug, Clone)]
pub struct Sanitized {
    /// Cleaned Markdown.
    pub markdown: String,
    /// First H1, if any.
    pub title: Option<String>,
    /// Headings of dropped sections.
    pub removed_sections: Vec<String>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Sanitize a fetched body according to its source kind.
pub fn sanitize_source(body: &str, kind: SourceKind, opts: &SanitizeOptions) -> Result<Sanitized> {
    match kind {
        SourceKind::Markdown => Ok(sanitize(body, opts)),
        SourceKind::Html => {
            let markdown = html_to_markdown(body)?;
            Ok(sanitize(&markdown, opts))
        }
    }
}

/// Strip non-content markup from Markdown text.
#[instrument(skip_all, fields(url = opts.source_url.as_deref().unwrap_or("-")))]
pub fn sanitize(md: &str, opts: &SanitizeOptions) -> Sanitized {
    let base_url = opts.source_url.as_deref().and_then(|u| Url::parse(u).ok());
    let (markdown, removed_sections) =
        cleanup::run_pipeline(md, &opts.excluded_sections, base_url.as_ref());

    let title = extract_title(&markdown);

    debug!(
        in_len = md.len(),
        out_len = markdown.len(),
        removed = removed_sections.len(),
        "sanitized document"
    );

    Sanitized {
        markdown,
        title,
        removed_sections,
    }
}

/// Convert an HTML page to Markdown, keeping only its main content.
#[instrument(skip_all, fields(html_len = html.len()))]
pub fn html_to_markdown(html: &str) -> Result<String> {
    let content_html = extract_content_html(html);
    let content_html = preprocess_tables(&content_html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg"])
        .build();

    converter
        .convert(&content_html)
        .map_err(|e| LlmDocsError::Fetch(format!("HTML conversion failed: {e}")))
}

// ---------------------------------------------------------------------------
// HTML helpers
// ---------------------------------------------------------------------------

/// Extract the main content HTML, stripping chrome (nav, header, footer, etc.).
fn extract_content_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    let selectors = [
        "article .markdown",
        ".md-content",
        ".vp-doc",
        "[role=\"main\"]",
        "article",
        "main",
        "body",
    ];

    for sel_str in &selectors {
        if let Ok(selector) = scraper::Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                return el.inner_html();
            }
        }
    }

    html.to_string()
}

/// Convert HTML `<table>` elements to Markdown tables before `htmd` runs.
///
/// `htmd` 0.1 doesn't support table conversion, so we handle it manually.
fn preprocess_tables(html: &str) -> String {
    let Ok(table_sel) = scraper::Selector::parse("table") else {
        return html.to_string();
    };
    let doc = Html::parse_fragment(html);

    let mut result = html.to_string();
    for table_el in doc.select(&table_sel) {
        let md_table = html_table_to_markdown(&table_el);
        result = result.replacen(&table_el.html(), &md_table, 1);
    }
    result
}

/// Convert a single HTML table element to a Markdown table string.
fn html_table_to_markdown(table: &scraper::ElementRef) -> String {
    let (Ok(tr_sel), Ok(cell_sel)) = (
        scraper::Selector::parse("tr"),
        scraper::Selector::parse("th, td"),
    ) else {
        return String::new();
    };

    let mut rows: Vec<Vec<String>> = table
        .select(&tr_sel)
        .map(|tr| {
            tr.select(&cell_sel)
                .map(|cell| cell.text().collect::<String>().trim().replace('|', "\\|"))
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }
    for row in &mut rows {
        row.resize(col_count, String::new());
    }

    let mut md = String::from("\n\n");
    for (i, row) in rows.iter().enumerate() {
        md.push_str("| ");
        md.push_str(&row.join(" | "));
        md.push_str(" |\n");
        if i == 0 {
            md.push_str("| ");
            md.push_str(&vec!["---"; col_count].join(" | "));
            md.push_str(" |\n");
        }
    }
    md.push('\n');
    md
}

/// Extract title from the first H1 in the Markdown text.
fn extract_title(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));

    H1_RE.captures(md).map(|c| c[1].trim().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
