//! Fenced code block scanning.
//!
//! Line-based: a fence opens with three or more backticks (or tildes) and
//! closes on a line holding at least as many of the same character and
//! nothing else.

/// A fenced code block located in a Markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// 0-based position among all fenced blocks in the document.
    pub index: usize,
    /// Full info string after the opening fence (e.g. `jac wrong`).
    pub info: String,
    /// First word of the info string, lowercased.
    pub lang: String,
    /// Block body without the fence lines.
    pub body: String,
    /// 1-based line of the opening fence.
    pub open_line: usize,
    /// 1-based line of the closing fence.
    pub close_line: usize,
}

impl FencedBlock {
    /// 1-based document line of the first non-blank body line, or the line
    /// after the opening fence when the body is blank.
    pub fn first_code_line(&self) -> usize {
        let leading_blank = self
            .body
            .lines()
            .take_while(|l| l.trim().is_empty())
            .count();
        if leading_blank == self.body.lines().count() {
            return self.open_line + 1;
        }
        self.open_line + 1 + leading_blank
    }

    /// Words of the info string after the language tag.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.info
            .split(|c: char| c.is_whitespace() || c == ',' || c == ':' || c == '{' || c == '}')
            .filter(|w| !w.is_empty())
            .skip(1)
    }

    /// Whether the block's language tag is one of `tags` (case-insensitive).
    pub fn is_tagged(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| t.eq_ignore_ascii_case(&self.lang))
    }
}

/// Result of scanning a document for fenced blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FenceScan {
    /// Closed blocks in document order.
    pub blocks: Vec<FencedBlock>,
    /// Opening line of a fence that was never closed.
    pub unterminated_at: Option<usize>,
}

impl FenceScan {
    pub fn is_balanced(&self) -> bool {
        self.unterminated_at.is_none()
    }
}

struct OpenFence {
    marker: char,
    len: usize,
    info: String,
    open_line: usize,
    body: Vec<String>,
}

/// Scan `md` for fenced code blocks.
pub fn scan_fences(md: &str) -> FenceScan {
    let mut scan = FenceScan::default();
    let mut open: Option<OpenFence> = None;

    for (i, line) in md.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = line.trim_start();

        match open.take() {
            None => {
                if let Some((marker, len)) = fence_marker(trimmed) {
                    let info = trimmed[len..].trim().to_string();
                    // Backtick fences may not carry backticks in the info string.
                    if marker == '`' && info.contains('`') {
                        continue;
                    }
                    open = Some(OpenFence {
                        marker,
                        len,
                        info,
                        open_line: line_no,
                        body: Vec::new(),
                    });
                }
            }
            Some(mut fence) => {
                if closes(trimmed, fence.marker, fence.len) {
                    let lang = fence
                        .info
                        .split(|c: char| c.is_whitespace() || c == ',' || c == ':' || c == '{')
                        .next()
                        .unwrap_or_default()
                        .to_ascii_lowercase();
                    scan.blocks.push(FencedBlock {
                        index: scan.blocks.len(),
                        info: fence.info,
                        lang,
                        body: fence.body.join("\n"),
                        open_line: fence.open_line,
                        close_line: line_no,
                    });
                } else {
                    fence.body.push(line.to_string());
                    open = Some(fence);
                }
            }
        }
    }

    scan.unterminated_at = open.map(|f| f.open_line);
    scan
}

/// Returns the fence character and run length if `line` opens a fence.
fn fence_marker(line: &str) -> Option<(char, usize)> {
    let marker = line.chars().next()?;
    if marker != '`' && marker != '~' {
        return None;
    }
    let len = line.chars().take_while(|&c| c == marker).count();
    (len >= 3).then_some((marker, len))
}

fn closes(line: &str, marker: char, len: usize) -> bool {
    let run = line.chars().take_while(|&c| c == marker).count();
    run >= len && line[run * marker.len_utf8()..].trim().is_empty()
}
