//! Sanitization pipeline for upstream Markdown.
//!
//! Each pass is a function `&str -> String` applied in sequence. Passes that
//! rewrite markup leave fenced code blocks untouched.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Run the full sanitization pipeline on Markdown text.
///
/// Returns the cleaned text and the headings of sections that were dropped.
pub(crate) fn run_pipeline(
    md: &str,
    excluded_sections: &[String],
    base_url: Option<&Url>,
) -> (String, Vec<String>) {
    let mut result = md.replace("\r\n", "\n");

    result = strip_frontmatter(&result);
    result = strip_html_comments(&result);
    let (without_sections, removed) = drop_excluded_sections(&result, excluded_sections);
    result = without_sections;
    result = outside_code(&result, strip_badges);
    result = outside_code(&result, strip_admonition_markers);
    result = outside_code(&result, strip_html_tags);
    result = fix_code_block_languages(&result);
    result = resolve_links(&result, base_url);
    result = clean_blank_lines(&result);
    result = normalize_whitespace(&result);
    result = ensure_trailing_newline(&result);

    (result, removed)
}

/// Apply a per-line rewrite to every line outside fenced code blocks.
fn outside_code(md: &str, rewrite: fn(&str) -> String) -> String {
    let mut out = Vec::new();
    let mut in_code_block = false;

    for line in md.lines() {
        if is_fence(line) {
            in_code_block = !in_code_block;
            out.push(line.to_string());
            continue;
        }
        if in_code_block {
            out.push(line.to_string());
        } else {
            out.push(rewrite(line));
        }
    }

    out.join("\n")
}

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

// ---------------------------------------------------------------------------
// Pass 1: Frontmatter
// ---------------------------------------------------------------------------

/// Remove a leading YAML frontmatter block.
fn strip_frontmatter(md: &str) -> String {
    static FM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)\A---\n.*?\n---\n").expect("valid regex"));

    FM_RE.replace(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: HTML comments
// ---------------------------------------------------------------------------

fn strip_html_comments(md: &str) -> String {
    static COMMENT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

    COMMENT_RE.replace_all(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Excluded sections
// ---------------------------------------------------------------------------

/// Drop every section whose heading matches one of `excluded` (case-insensitive),
/// up to the next heading of the same or higher level.
fn drop_excluded_sections(md: &str, excluded: &[String]) -> (String, Vec<String>) {
    static H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").expect("valid regex"));

    if excluded.is_empty() {
        return (md.to_string(), Vec::new());
    }

    let mut out = Vec::new();
    let mut removed = Vec::new();
    let mut skipping_level: Option<usize> = None;
    let mut in_code_block = false;

    for line in md.lines() {
        if is_fence(line) {
            in_code_block = !in_code_block;
        }

        if !in_code_block {
            if let Some(caps) = H_RE.captures(line) {
                let level = caps[1].len();
                let title = caps[2].trim();

                if let Some(skip) = skipping_level {
                    if level <= skip {
                        skipping_level = None;
                    }
                }

                if skipping_level.is_none()
                    && excluded.iter().any(|e| e.eq_ignore_ascii_case(title))
                {
                    skipping_level = Some(level);
                    removed.push(title.to_string());
                    continue;
                }
            }
        }

        if skipping_level.is_none() {
            out.push(line);
        }
    }

    (out.join("\n"), removed)
}

// ---------------------------------------------------------------------------
// Pass 4: Badges
// ---------------------------------------------------------------------------

/// Remove shield/badge images, including linked badges.
fn strip_badges(line: &str) -> String {
    static BADGE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"\[?!\[[^\]]*\]\([^)]*(?:shields\.io|badge|badgen\.net)[^)]*\)(?:\]\([^)]*\))?",
        )
        .expect("valid regex")
    });

    BADGE_RE.replace_all(line, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Admonitions
// ---------------------------------------------------------------------------

/// Drop `:::note` / `!!! tip` container markers, keeping their contents.
fn strip_admonition_markers(line: &str) -> String {
    static ADMONITION_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(?::::+\s*\w*.*|!!!\s+\w+.*|\?\?\?\+?\s+\w+.*)$").expect("valid regex")
    });

    if ADMONITION_RE.is_match(line) {
        String::new()
    } else {
        line.to_string()
    }
}

// ---------------------------------------------------------------------------
// Pass 6: Leftover HTML / JSX tags
// ---------------------------------------------------------------------------

/// Strip layout HTML and capitalized JSX component tags from a line,
/// preserving inner text.
fn strip_html_tags(line: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary|p|center|picture|source|img)(?:\s[^>]*)?/?>").expect("valid regex")
    });
    static JSX_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?[A-Z][A-Za-z0-9]*(?:\s[^>]*)?/?>").expect("valid regex")
    });

    let line = HTML_TAG_RE.replace_all(line, "");
    JSX_TAG_RE.replace_all(&line, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 7: Code block language hints
// ---------------------------------------------------------------------------

/// Normalize class-like language hints (`language-jac`, `lang-python`).
fn fix_code_block_languages(md: &str) -> String {
    static LANG_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^(\s*)```(?:language-|lang-|highlight-)(\w+)").expect("valid regex")
    });

    LANG_PREFIX_RE.replace_all(md, "$1```$2").to_string()
}

// ---------------------------------------------------------------------------
// Pass 8: Resolve relative links
// ---------------------------------------------------------------------------

/// Resolve relative URLs in Markdown links against the source URL.
fn resolve_links(md: &str, base_url: Option<&Url>) -> String {
    let Some(base) = base_url else {
        return md.to_string();
    };

    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

    let mut out = Vec::new();
    let mut in_code_block = false;

    for line in md.lines() {
        if is_fence(line) {
            in_code_block = !in_code_block;
        }
        if in_code_block || is_fence(line) {
            out.push(line.to_string());
            continue;
        }

        let resolved = LINK_RE.replace_all(line, |caps: &regex::Captures| {
            let text = &caps[1];
            let href = &caps[2];

            if href.starts_with("http://")
                || href.starts_with("https://")
                || href.starts_with('#')
                || href.starts_with("mailto:")
            {
                return caps[0].to_string();
            }

            match base.join(href) {
                Ok(joined) => format!("[{text}]({joined})"),
                Err(_) => caps[0].to_string(),
            }
        });
        out.push(resolved.to_string());
    }

    out.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 9: Collapse blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ blank lines into exactly 2.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 10: Whitespace
// ---------------------------------------------------------------------------

fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_start_matches('\n')
        .to_string()
}

/// Ensure the file ends with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
