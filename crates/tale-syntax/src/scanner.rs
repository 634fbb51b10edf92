//! Directive scanner.
//!
//! Splits text into `text`, `leaf` and `container` spans without allocating.
//! A directive span starts at a colon run that is not preceded by an
//! alphanumeric character, another colon or a backslash, and that is followed
//! by a name (or, for three or more colons, by nothing: a closing fence).
//! The span then takes an optional `[label]` and an optional `{attrs}`.
//!
//! Scanning never fails. A label or attribute block that runs off the end of
//! the input becomes one `leaf` span covering the rest of the text.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::attrs::parse_attributes;

/// Span flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenKind {
    /// Anything outside a directive.
    Text,
    /// Directive opened by one or two colons, or an unterminated directive.
    Leaf,
    /// Directive opened by three or more colons, or a bare closing fence.
    Container,
}

/// One scanned span, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DirectiveToken<'a> {
    /// Span flavor.
    pub kind: TokenKind,
    /// The exact source text.
    pub value: &'a str,
    /// Byte offset of `value` in the input.
    pub offset: usize,
}

/// Iterator over the tokens of a text. Created by [`scan`].
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

/// Scan `text` into directive tokens.
///
/// Concatenating the token values reproduces `text` exactly.
///
/// # Example
///
/// ```
/// use tale_syntax::{TokenKind, scan};
///
/// let tokens: Vec<_> = scan("Gold: :show[gold] coins").collect();
/// assert_eq!(tokens.len(), 3);
/// assert_eq!(tokens[1].kind, TokenKind::Leaf);
/// assert_eq!(tokens[1].value, ":show[gold]");
/// ```
#[must_use]
pub fn scan(text: &str) -> Scanner<'_> {
    Scanner { text, pos: 0 }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = DirectiveToken<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.text.len() {
            return None;
        }
        let start = self.pos;
        let Some(opener) = find_opener(self.text, start) else {
            self.pos = self.text.len();
            return Some(token(TokenKind::Text, self.text, start, self.pos));
        };
        if opener > start {
            self.pos = opener;
            return Some(token(TokenKind::Text, self.text, start, opener));
        }

        let span = directive_span(&self.text[start..]);
        self.pos = start + span.len;
        let kind = if !span.terminated || span.colons < 3 {
            TokenKind::Leaf
        } else {
            TokenKind::Container
        };
        Some(token(kind, self.text, start, self.pos))
    }
}

fn token(kind: TokenKind, text: &str, start: usize, end: usize) -> DirectiveToken<'_> {
    DirectiveToken {
        kind,
        value: &text[start..end],
        offset: start,
    }
}

/// Byte offset of the next directive opener at or after `from`.
fn find_opener(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] != b':' {
            i += 1;
            continue;
        }
        let run = bytes[i..].iter().take_while(|&&b| b == b':').count();
        let preceded_ok = text[..i]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || c == ':' || c == '\\'));
        let next = bytes.get(i + run).copied();
        let opens = next.is_some_and(|b| b.is_ascii_alphabetic())
            || (run >= 3 && !next.is_some_and(is_name_byte));
        if preceded_ok && opens {
            return Some(i);
        }
        i += run;
    }
    None
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

/// Shape of a directive span at the start of a string.
struct Span {
    colons: usize,
    name_end: usize,
    label: Option<(usize, usize)>,
    attrs: Option<(usize, usize)>,
    len: usize,
    terminated: bool,
}

/// Measure the directive at the start of `s` (which begins with colons).
fn directive_span(s: &str) -> Span {
    let bytes = s.as_bytes();
    let colons = bytes.iter().take_while(|&&b| b == b':').count();
    let name_end = colons
        + bytes[colons..]
            .iter()
            .take_while(|&&b| is_name_byte(b))
            .count();

    let mut span = Span {
        colons,
        name_end,
        label: None,
        attrs: None,
        len: name_end,
        terminated: true,
    };
    if name_end == colons {
        return span;
    }

    if bytes.get(span.len) == Some(&b'[') {
        match balanced_end(&s[span.len..], '[', ']', false) {
            Some(end) => {
                span.label = Some((span.len + 1, span.len + end - 1));
                span.len += end;
            }
            None => {
                span.len = s.len();
                span.terminated = false;
                return span;
            }
        }
    }
    if bytes.get(span.len) == Some(&b'{') {
        match balanced_end(&s[span.len..], '{', '}', true) {
            Some(end) => {
                span.attrs = Some((span.len + 1, span.len + end - 1));
                span.len += end;
            }
            None => {
                span.len = s.len();
                span.terminated = false;
            }
        }
    }
    span
}

/// Length up to and including the bracket that closes the one at the start
/// of `s`, honouring nesting and backslash escapes.
fn balanced_end(s: &str, open: char, close: char, quotes: bool) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next()?;
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        if quotes && (c == '"' || c == '\'') {
            quote = Some(c);
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i + c.len_utf8());
            }
        }
    }
    None
}

/// Structured form of a directive token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveHeader {
    /// Length of the opening colon run.
    pub colons: usize,
    /// Directive name.
    pub name: String,
    /// Label text with escapes removed.
    pub label: Option<String>,
    /// Raw attributes.
    pub attributes: BTreeMap<String, String>,
    /// Whether label and attribute blocks were closed.
    pub terminated: bool,
}

/// Parse a directive token.
///
/// Returns `None` for text tokens and bare closing fences.
///
/// ```
/// use tale_syntax::{parse_directive, scan};
///
/// let token = scan(":::if[hp > 0]{once}").next().unwrap();
/// let header = parse_directive(&token).unwrap();
/// assert_eq!(header.colons, 3);
/// assert_eq!(header.name, "if");
/// assert_eq!(header.label.as_deref(), Some("hp > 0"));
/// assert!(header.attributes.contains_key("once"));
/// ```
#[must_use]
pub fn parse_directive(token: &DirectiveToken<'_>) -> Option<DirectiveHeader> {
    if token.kind == TokenKind::Text {
        return None;
    }
    parse_header(token.value).map(|(header, _)| header)
}

/// Parse a directive at the start of `s`, returning it with the number of
/// bytes it spans.
pub(crate) fn parse_header(s: &str) -> Option<(DirectiveHeader, usize)> {
    if !s.starts_with(':') {
        return None;
    }
    let span = directive_span(s);
    if span.name_end == span.colons {
        return None;
    }
    let label = span.label.map(|(a, b)| unescape(&s[a..b]));
    let attributes = span
        .attrs
        .map(|(a, b)| parse_attributes(&s[a..b]))
        .unwrap_or_default();
    let header = DirectiveHeader {
        colons: span.colons,
        name: s[span.colons..span.name_end].to_owned(),
        label,
        attributes,
        terminated: span.terminated,
    };
    Some((header, span.len))
}

/// Drop backslashes that escape punctuation.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek().is_some_and(char::is_ascii_punctuation) {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<(TokenKind, &str)> {
        scan(text).map(|t| (t.kind, t.value)).collect()
    }

    #[test]
    fn test_round_trip() {
        let samples = [
            "",
            "plain prose",
            ":::if[a > 1]\nyes\n:::else\nno\n:::",
            "a :b[c]{d=e} f ::g :h{",
            "10:30 and http://x and \\:escaped",
            ":name[abc\\",
            "emoji 🎲 :roll[d6]{sides=\"6\"} done",
        ];
        for text in samples {
            let joined: String = scan(text).map(|t| t.value).collect();
            assert_eq!(joined, text);
        }
    }

    #[test]
    fn test_container_and_fence() {
        assert_eq!(
            kinds(":::if[x]\nhi\n:::"),
            vec![
                (TokenKind::Container, ":::if[x]"),
                (TokenKind::Text, "\nhi\n"),
                (TokenKind::Container, ":::"),
            ]
        );
    }

    #[test]
    fn test_not_an_opener() {
        assert_eq!(kinds("10:30"), vec![(TokenKind::Text, "10:30")]);
        assert_eq!(kinds("a \\:b"), vec![(TokenKind::Text, "a \\:b")]);
        assert_eq!(kinds("x : y"), vec![(TokenKind::Text, "x : y")]);
        assert_eq!(kinds("::1"), vec![(TokenKind::Text, "::1")]);
    }

    #[test]
    fn test_unterminated_attrs_is_one_leaf() {
        assert_eq!(kinds(":name{"), vec![(TokenKind::Leaf, ":name{")]);
        assert_eq!(kinds("go :name{a=\"}"), vec![
            (TokenKind::Text, "go "),
            (TokenKind::Leaf, ":name{a=\"}"),
        ]);
    }

    #[test]
    fn test_trailing_backslash_is_one_leaf() {
        assert_eq!(kinds(":name[abc\\"), vec![(TokenKind::Leaf, ":name[abc\\")]);
        assert_eq!(kinds(":::box{x=\\"), vec![(TokenKind::Leaf, ":::box{x=\\")]);
    }

    #[test]
    fn test_nested_label_and_quoted_braces() {
        let text = r#":say[a [b] c]{text="}"} tail"#;
        assert_eq!(
            kinds(text),
            vec![
                (TokenKind::Leaf, r#":say[a [b] c]{text="}"}"#),
                (TokenKind::Text, " tail"),
            ]
        );
    }

    #[test]
    fn test_parse_directive_unescapes_label() {
        let token = scan(r":show[a \] b]").next().unwrap();
        let header = parse_directive(&token).unwrap();
        assert_eq!(header.label.as_deref(), Some("a ] b"));
        assert!(header.terminated);
    }

    #[test]
    fn test_parse_directive_rejects_fence_and_text() {
        let tokens: Vec<_> = scan("hi :::").collect();
        assert_eq!(parse_directive(&tokens[0]), None);
        assert_eq!(parse_directive(&tokens[1]), None);
    }

    #[test]
    fn test_unterminated_header() {
        let token = scan(":set{key=gold").next().unwrap();
        let header = parse_directive(&token).unwrap();
        assert!(!header.terminated);
        assert_eq!(header.attributes["key"], "gold");
    }
}
