//! Dot-delimited key paths and the tree operations behind them.
//!
//! `player.inventory.weapon` addresses nested objects; numeric segments
//! (`items.0`, or `items[0]`) address array elements.

use std::fmt;

use serde_json::{Map, Value};

use crate::StateError;

/// Parsed key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Parse a key path.
    ///
    /// Bracket indices are accepted as a synonym for numeric segments.
    ///
    /// ```
    /// use tale_state::KeyPath;
    ///
    /// let path = KeyPath::parse("player.items[2].name").unwrap();
    /// assert_eq!(path.segments(), ["player", "items", "2", "name"]);
    /// assert_eq!(path.root(), "player");
    /// assert!(KeyPath::parse("player..name").is_err());
    /// ```
    pub fn parse(path: &str) -> Result<Self, StateError> {
        let invalid = || StateError::InvalidPath(path.to_owned());
        let mut segments = Vec::new();

        for part in path.split('.') {
            let (head, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if !is_valid_segment(head) {
                return Err(invalid());
            }
            segments.push(head.to_owned());

            while !rest.is_empty() {
                let inner = rest.strip_prefix('[').ok_or_else(invalid)?;
                let close = inner.find(']').ok_or_else(invalid)?;
                let index = &inner[..close];
                if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                segments.push(index.to_owned());
                rest = &inner[close + 1..];
            }
        }

        Ok(Self { segments })
    }

    /// Path segments in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Top-level key.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Whether `self` equals `other` or lies underneath it.
    #[must_use]
    pub fn starts_with(&self, other: &KeyPath) -> bool {
        self.segments.starts_with(&other.segments)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '[' | ']' | '.'))
}

/// Read the value at `path`.
pub(crate) fn get<'a>(root: &'a Map<String, Value>, path: &KeyPath) -> Option<&'a Value> {
    let (first, rest) = path.segments.split_first()?;
    let mut current = root.get(first)?;
    for segment in rest {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Check that [`set`] would succeed without touching the tree.
fn check_writable(root: &Map<String, Value>, path: &KeyPath) -> Result<(), StateError> {
    let Some((first, rest)) = path.segments.split_first() else {
        return Err(StateError::InvalidPath(String::new()));
    };
    let mut current = root.get(first);
    for (depth, segment) in rest.iter().enumerate() {
        let Some(value) = current else {
            return Ok(());
        };
        current = match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => {
                let index = parse_index(segment, path)?;
                if index > items.len() {
                    return Err(StateError::IndexOutOfBounds {
                        path: path.to_string(),
                        index,
                    });
                }
                items.get(index)
            }
            _ => {
                return Err(StateError::NotAContainer {
                    path: path.to_string(),
                    parent: path.segments[..=depth].join("."),
                });
            }
        };
    }
    Ok(())
}

/// Write `value` at `path`, creating intermediate objects as needed.
///
/// On error the tree is unchanged.
pub(crate) fn set(
    root: &mut Map<String, Value>,
    path: &KeyPath,
    value: Value,
) -> Result<(), StateError> {
    check_writable(root, path)?;
    let segments = &path.segments;
    let Some((last, parents)) = segments.split_last() else {
        return Err(StateError::InvalidPath(String::new()));
    };
    if parents.is_empty() {
        root.insert(last.clone(), value);
        return Ok(());
    }

    let mut current = root
        .entry(parents[0].clone())
        .or_insert_with(|| Value::Object(Map::new()));
    for (depth, segment) in parents.iter().enumerate().skip(1) {
        current = child_mut(current, segment, path, depth)?;
    }

    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = parse_index(last, path)?;
            match index.cmp(&items.len()) {
                std::cmp::Ordering::Less => items[index] = value,
                std::cmp::Ordering::Equal => items.push(value),
                std::cmp::Ordering::Greater => {
                    return Err(StateError::IndexOutOfBounds {
                        path: path.to_string(),
                        index,
                    });
                }
            }
            Ok(())
        }
        _ => Err(StateError::NotAContainer {
            path: path.to_string(),
            parent: parents.join("."),
        }),
    }
}

/// Descend one level for writing, creating a missing object.
fn child_mut<'a>(
    current: &'a mut Value,
    segment: &str,
    path: &KeyPath,
    depth: usize,
) -> Result<&'a mut Value, StateError> {
    match current {
        Value::Object(map) => Ok(map
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => {
            let index = parse_index(segment, path)?;
            if index == items.len() {
                items.push(Value::Object(Map::new()));
            }
            items
                .get_mut(index)
                .ok_or_else(|| StateError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                })
        }
        _ => Err(StateError::NotAContainer {
            path: path.to_string(),
            parent: path.segments[..depth].join("."),
        }),
    }
}

fn parse_index(segment: &str, path: &KeyPath) -> Result<usize, StateError> {
    segment
        .parse::<usize>()
        .map_err(|_| StateError::InvalidPath(path.to_string()))
}

/// Remove the value at `path`, pruning ancestor objects left empty.
///
/// Returns whether anything was removed.
pub(crate) fn unset(root: &mut Map<String, Value>, path: &KeyPath) -> bool {
    let Some((first, rest)) = path.segments.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return root.remove(first).is_some();
    }
    let Some(child) = root.get_mut(first) else {
        return false;
    };
    let removed = remove_below(child, rest);
    if removed && is_empty_object(child) {
        root.remove(first);
    }
    removed
}

fn remove_below(current: &mut Value, segments: &[String]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return false;
    };
    match current {
        Value::Object(map) => {
            if rest.is_empty() {
                return map.remove(first).is_some();
            }
            let Some(child) = map.get_mut(first) else {
                return false;
            };
            let removed = remove_below(child, rest);
            if removed && is_empty_object(child) {
                map.remove(first);
            }
            removed
        }
        Value::Array(items) => {
            let Ok(index) = first.parse::<usize>() else {
                return false;
            };
            if index >= items.len() {
                return false;
            }
            if rest.is_empty() {
                items.remove(index);
                return true;
            }
            let removed = remove_below(&mut items[index], rest);
            if removed && is_empty_object(&items[index]) {
                items.remove(index);
            }
            removed
        }
        _ => false,
    }
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(Map::is_empty)
}
