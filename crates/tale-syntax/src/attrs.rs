//! Raw attribute parsing.
//!
//! Parses the inside of a `{...}` attribute block into raw strings:
//! `#id`, `.class`, `key="value"`, `key='value'`, `key=value` and bare
//! `flag` keys. Values are not coerced here; see [`crate::parse_typed_value`].

use std::collections::BTreeMap;

/// Parse an attribute block (without the braces).
///
/// `#id` becomes the `id` attribute; `.class` entries are joined into `class`.
/// Bare keys map to the empty string. Unquoted values run to the next
/// whitespace outside brackets, braces and parentheses, so `value=[1, 2]`
/// keeps its list intact.
///
/// # Example
///
/// ```
/// use tale_syntax::parse_attributes;
///
/// let attrs = parse_attributes(r#"#door .big .red key=gold value="gold + 10" lock"#);
/// assert_eq!(attrs["id"], "door");
/// assert_eq!(attrs["class"], "big red");
/// assert_eq!(attrs["key"], "gold");
/// assert_eq!(attrs["value"], "gold + 10");
/// assert_eq!(attrs["lock"], "");
/// ```
#[must_use]
pub fn parse_attributes(source: &str) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();
    let mut classes: Vec<String> = Vec::new();
    let mut rest = source.trim_start();

    while let Some(first) = rest.chars().next() {
        match first {
            '#' | '.' => {
                let end = rest[1..]
                    .find(|c: char| c.is_whitespace() || c == '.' || c == '#')
                    .map_or(rest.len(), |i| i + 1);
                let word = &rest[1..end];
                if !word.is_empty() {
                    if first == '#' {
                        attrs.insert("id".to_owned(), word.to_owned());
                    } else {
                        classes.push(word.to_owned());
                    }
                }
                rest = &rest[end..];
            }
            _ => {
                let key_end = rest
                    .find(|c: char| c == '=' || c.is_whitespace())
                    .unwrap_or(rest.len());
                let key = &rest[..key_end];
                let after_key = &rest[key_end..];
                if let Some(after_eq) = after_key.strip_prefix('=') {
                    let (value, remaining) = split_value(after_eq);
                    if !key.is_empty() {
                        attrs.insert(key.to_owned(), value);
                    }
                    rest = remaining;
                } else {
                    if !key.is_empty() {
                        attrs.insert(key.to_owned(), String::new());
                    }
                    rest = after_key;
                }
            }
        }
        rest = rest.trim_start();
    }

    if !classes.is_empty() {
        attrs.insert("class".to_owned(), classes.join(" "));
    }
    attrs
}

/// Split one attribute value off the front of `s`.
///
/// Quoted values are unescaped and lose their quotes. An unterminated quote
/// takes the rest of the input.
fn split_value(s: &str) -> (String, &str) {
    let Some(quote) = s.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        let end = unquoted_end(s);
        return (s[..end].to_owned(), &s[end..]);
    };

    let mut value = String::new();
    let mut chars = s.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) if escaped == quote || escaped == '\\' => value.push(escaped),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => value.push('\\'),
            },
            c if c == quote => return (value, &s[i + c.len_utf8()..]),
            c => value.push(c),
        }
    }
    (value, "")
}

fn unquoted_end(s: &str) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' if depth > 0 => quote = Some(c),
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => return i,
            _ => {}
        }
    }
    s.len()
}

/// Write attributes back in `{...}` syntax (without the braces).
///
/// Empty values become bare keys; everything else is double-quoted.
#[must_use]
pub fn attributes_to_syntax(attrs: &BTreeMap<String, String>) -> String {
    attrs
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                let escaped = value.replace('\\', r"\\").replace('"', r#"\""#);
                format!(r#"{key}="{escaped}""#)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
