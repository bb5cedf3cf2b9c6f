use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::Result;
use crate::extract::includes::IncludeReference;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*#\s*(?:include|import)\b\s*(?:<([^<>"]+)>|"([^"]+)")"#)
        .expect("valid include pattern")
});

/// Extracts include directives from a file's text in order of appearance.
///
/// Conditional blocks are not evaluated: an include under `#if 0` is still
/// reported. Directives that don't name a literal `"path"` or `<path>`
/// (for example `#include MACRO`) are skipped.
pub fn parse_includes(text: &str) -> Vec<IncludeReference> {
    let mut includes = Vec::new();
    let mut in_block_comment = false;

    for raw_line in text.lines() {
        let line = strip_comments(raw_line, &mut in_block_comment);
        if line.trim().is_empty() {
            continue;
        }

        let Some(captures) = DIRECTIVE.captures(&line) else {
            continue;
        };

        if let Some(system) = captures.get(1) {
            includes.push(IncludeReference::system(system.as_str().trim()));
        } else if let Some(quoted) = captures.get(2) {
            includes.push(IncludeReference::quoted(quoted.as_str().trim()));
        }
    }

    includes
}

pub fn parse_bytes(content: &[u8]) -> Vec<IncludeReference> {
    if memchr::memchr(b'#', content).is_none() {
        return Vec::new();
    }
    parse_includes(&String::from_utf8_lossy(content))
}

pub async fn parse_file(path: &Path) -> Result<Vec<IncludeReference>> {
    let content = super::read::read_file(path).await?;
    Ok(parse_bytes(&content))
}

/// Blanks out comment text on one line, carrying block comment state across
/// lines. Comment markers inside `"..."` and `'...'` literals are kept as
/// text; a literal never continues onto the next line.
fn strip_comments(line: &str, in_block_comment: &mut bool) -> String {
    let mut out = String::with_capacity(line.len());
    let bytes = line.as_bytes();
    let mut literal: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        if *in_block_comment {
            if bytes[i..].starts_with(b"*/") {
                *in_block_comment = false;
                out.push(' ');
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }

        match literal {
            Some(_) if bytes[i] == b'\\' && i + 1 < bytes.len() => {
                let escaped_len = 1 + utf8_len(bytes[i + 1]);
                out.push_str(&line[i..i + escaped_len]);
                i += escaped_len;
                continue;
            }
            Some(quote) if bytes[i] == quote => literal = None,
            Some(_) => {}
            None if bytes[i..].starts_with(b"//") => break,
            None if bytes[i..].starts_with(b"/*") => {
                *in_block_comment = true;
                i += 2;
                continue;
            }
            None if bytes[i] == b'"' || bytes[i] == b'\'' => literal = Some(bytes[i]),
            None => {}
        }

        let ch_len = utf8_len(bytes[i]);
        out.push_str(&line[i..i + ch_len]);
        i += ch_len;
    }

    out
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}
