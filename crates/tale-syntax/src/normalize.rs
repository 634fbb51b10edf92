//! Indentation normalizer.
//!
//! Markdown treats four leading spaces as a code block, so directive lines
//! indented for readability inside nested containers would turn into
//! literal code. The normalizer drops that indentation before directive
//! markers and repairs `::::::` runs left behind when whitespace trimming
//! glued a closing fence onto the next opening fence.

use std::ops::Range;

use crate::fence::FenceTracker;
use crate::scanner::{TokenKind, scan};

/// Normalize directive indentation in `text`.
///
/// Whitespace between a line start and a directive marker is removed when
/// it is a run of tabs only, or of two or more spaces only. A single space
/// and mixed tab/space runs are kept. Text without directive markers is
/// returned unchanged, as is everything inside fenced code blocks.
///
/// # Example
///
/// ```
/// use tale_syntax::normalize;
///
/// let text = ":::if[gold > 1]\n    :::for[x in items]\n    :show[x]\n    :::\n:::";
/// assert_eq!(
///     normalize(text),
///     ":::if[gold > 1]\n:::for[x in items]\n:show[x]\n:::\n:::"
/// );
/// assert_eq!(normalize("::::::next"), ":::\n:::next");
/// ```
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut line_start = 0;
    let fenced = fenced_lines(text);

    for token in scan(text) {
        let opaque = fenced.iter().any(|lines| lines.contains(&token.offset));
        if opaque {
            out.push_str(token.value);
        } else {
            if token.kind != TokenKind::Text && should_strip(&out[line_start..]) {
                out.truncate(line_start);
            }
            let colons = token.value.bytes().take_while(|&b| b == b':').count();
            if token.kind == TokenKind::Container && colons == 6 {
                out.push_str(":::\n");
                out.push_str(&token.value[3..]);
            } else {
                out.push_str(token.value);
            }
        }
        if let Some(newline) = out[line_start..].rfind('\n') {
            line_start += newline + 1;
        }
    }

    out
}

/// Byte ranges of the lines that belong to fenced code blocks, fence
/// lines included.
fn fenced_lines(text: &str) -> Vec<Range<usize>> {
    let mut tracker = FenceTracker::new();
    let mut ranges = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let inside = tracker.in_fence();
        let toggled = tracker.update(line.trim_end_matches(['\n', '\r']));
        if inside || toggled {
            ranges.push(offset..offset + line.len());
        }
        offset += line.len();
    }
    ranges
}

/// Whether the whitespace before a directive marker is removable.
fn should_strip(prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    let tabs = prefix.chars().all(|c| c == '\t');
    let spaces = prefix.chars().all(|c| c == ' ');
    tabs || (spaces && prefix.len() >= 2)
}
