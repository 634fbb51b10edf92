//! Typed attribute values.
//!
//! Raw attribute strings are coerced by trying, in order: a quoted string,
//! a boolean, an object or array literal (including the bare
//! `key: value, key: value` form), a finite number, and finally an expression
//! evaluated against the game state. Anything that fails to evaluate is kept
//! as the raw string.

use serde_json::{Map, Value};
use tale_expr::{EmptyScope, Scope, get_compiled_expression, number_value};

/// Coerce a raw attribute value.
///
/// Expressions are evaluated strictly: an unknown identifier is an error, so
/// the raw string comes back (`color=red` stays `"red"`).
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tale_syntax::parse_typed_value;
///
/// let state = json!({"gold": 5});
/// assert_eq!(parse_typed_value("'{a:1}'", None), json!("{a:1}"));
/// assert_eq!(parse_typed_value("true", None), json!(true));
/// assert_eq!(parse_typed_value("[1, 'two']", None), json!([1, "two"]));
/// assert_eq!(parse_typed_value("x: 1, y: 2", None), json!({"x": 1, "y": 2}));
/// assert_eq!(parse_typed_value("2.50", None), json!(2.5));
/// assert_eq!(parse_typed_value("gold + 10", Some(&state)), json!(15));
/// assert_eq!(parse_typed_value("red", Some(&state)), json!("red"));
/// ```
#[must_use]
pub fn parse_typed_value(raw: &str, scope: Option<&dyn Scope>) -> Value {
    let trimmed = raw.trim();

    if let Some(inner) = unquote(trimmed) {
        return Value::String(inner.to_owned());
    }
    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Some(value) = parse_literal(trimmed, scope) {
        return value;
    }
    if let Some(number) = parse_number(trimmed) {
        return number;
    }

    let scope = scope.unwrap_or(&EmptyScope);
    match get_compiled_expression(trimmed).and_then(|compiled| compiled.eval(scope)) {
        Ok(value) => value,
        Err(err) => {
            tracing::trace!(raw, %err, "attribute kept as string");
            Value::String(raw.to_owned())
        }
    }
}

/// Parse the bare `key: value, key: value` form into a mapping.
///
/// Keys may be bare words or quoted. Each value is coerced with
/// [`parse_typed_value`] (without a scope). Returns `None` when any member
/// lacks a key.
///
/// ```
/// use serde_json::json;
/// use tale_syntax::parse_object_literal;
///
/// let map = parse_object_literal("name: 'Ada', hp: 10").unwrap();
/// assert_eq!(map["name"], json!("Ada"));
/// assert_eq!(map["hp"], json!(10));
/// assert!(parse_object_literal("just words").is_none());
/// ```
#[must_use]
pub fn parse_object_literal(raw: &str) -> Option<Map<String, Value>> {
    parse_members(raw, None)
}

/// Interior of a string fully wrapped in one pair of matching quotes.
fn unquote(s: &str) -> Option<&str> {
    let quote = s.chars().next().filter(|c| matches!(c, '\'' | '"' | '`'))?;
    if s.len() < 2 || !s.ends_with(quote) {
        return None;
    }
    let inner = &s[1..s.len() - 1];
    let mut escaped = false;
    for c in inner.chars() {
        match c {
            '\\' if !escaped => escaped = true,
            c if c == quote && !escaped => return None,
            _ => escaped = false,
        }
    }
    Some(inner)
}

fn parse_number(s: &str) -> Option<Value> {
    let first = s.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '-' | '+' | '.')) {
        return None;
    }
    let n: f64 = s.parse().ok()?;
    n.is_finite().then(|| number_value(n))
}

/// Object or array literal, or the bare colon form.
fn parse_literal(s: &str, scope: Option<&dyn Scope>) -> Option<Value> {
    if let Some(inner) = wrapped(s, '[', ']') {
        let items = split_top_level(inner, ',')
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .map(|part| parse_typed_value(part, scope))
            .collect();
        return Some(Value::Array(items));
    }
    if let Some(inner) = wrapped(s, '{', '}') {
        return parse_members(inner, scope).map(Value::Object);
    }
    if has_top_level(s, ':') && !has_top_level(s, '?') {
        return parse_members(s, scope).map(Value::Object);
    }
    None
}

fn parse_members(s: &str, scope: Option<&dyn Scope>) -> Option<Map<String, Value>> {
    let mut map = Map::new();
    for member in split_top_level(s, ',') {
        if member.trim().is_empty() {
            continue;
        }
        let key_part = split_top_level(member, ':').into_iter().next()?;
        let value = member.get(key_part.len() + 1..)?;
        let key_part = key_part.trim();
        let key = match unquote(key_part) {
            Some(quoted) => quoted,
            None if is_identifier(key_part) => key_part,
            None => return None,
        };
        if value.trim_start().starts_with('/') {
            return None;
        }
        map.insert(key.to_owned(), parse_typed_value(value, scope));
    }
    Some(map)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '-'))
}

/// Interior when `s` opens with `open` and the matching close is its last
/// character.
fn wrapped(s: &str, open: char, close: char) -> Option<&str> {
    if !s.starts_with(open) || !s.ends_with(close) {
        return None;
    }
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
            '\'' | '"' | '`' => quote = Some(c),
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return (i + c.len_utf8() == s.len()).then(|| &s[1..i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `sep` outside quotes and brackets.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn has_top_level(s: &str, needle: char) -> bool {
    split_top_level(s, needle).len() > 1
}
