//! Lexical helpers for Jac source: brace matching that ignores braces inside
//! strings and comments.

/// Byte offset of the `}` matching the `{` at `open`, if any.
///
/// `#` starts a line comment and `#* ... *#` a block comment; single- and
/// double-quoted strings honour backslash escapes.
pub(crate) fn matching_brace(code: &str, open: usize) -> Option<usize> {
    let bytes = code.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'#' if bytes.get(i + 1) == Some(&b'*') => {
                i = match code[i + 2..].find("*#") {
                    Some(end) => i + 2 + end + 2,
                    None => return None,
                };
            }
            b'#' => {
                i = code[i..].find('\n').map_or(bytes.len(), |nl| i + nl + 1);
            }
            quote @ (b'"' | b'\'') => {
                i = skip_string(bytes, i, quote);
            }
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Index just past the string literal opening at `start`.
fn skip_string(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Comment lines directly above `pos`, joined into one sentence.
pub(crate) fn docstring_before(code: &str, pos: usize) -> Option<String> {
    let line_start = code[..pos].rfind('\n').map_or(0, |i| i + 1);
    let mut lines: Vec<&str> = Vec::new();

    for line in code[..line_start].lines().rev() {
        let trimmed = line.trim();
        match trimmed.strip_prefix('#') {
            Some(rest) if !rest.starts_with('*') => {
                let text = rest.trim();
                if !text.is_empty() {
                    lines.push(text);
                }
            }
            _ => break,
        }
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join(" "))
}

/// Collapse runs of whitespace into single spaces.
pub(crate) fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_nested_braces() {
        let code = "node A { can f { if x { y; } } } tail";
        assert_eq!(matching_brace(code, 7), Some(31));
    }

    #[test]
    fn ignores_braces_in_strings_and_comments() {
        let code = "obj A {\n  has s: str = \"}\";\n  # } stray\n  #* { *#\n}";
        let close = matching_brace(code, 6).unwrap();
        assert_eq!(close, code.len() - 1);
    }

    #[test]
    fn unmatched_brace_is_none() {
        assert_eq!(matching_brace("walker W { can go {", 9), None);
        assert_eq!(matching_brace("no brace here", 0), None);
    }

    #[test]
    fn docstring_collects_adjacent_comments() {
        let code = "x = 1;\n# A person.\n# Has a name.\nnode Person {}";
        let pos = code.find("node").unwrap();
        assert_eq!(docstring_before(code, pos).as_deref(), Some("A person. Has a name."));
        assert_eq!(docstring_before("node A {}", 0), None);
    }
}
