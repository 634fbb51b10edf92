//! Value coercions shared by the evaluator and directive handlers.
//!
//! Values are plain [`serde_json::Value`]s. Coercions follow the loose
//! scripting conventions authors expect from story formats: empty strings and
//! zero are falsy, `"5" == 5` holds, `+` concatenates when either side is a
//! string.

use serde_json::{Number, Value};

/// Largest integer magnitude represented exactly by an `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Convert an `f64` into a JSON number, keeping integral values as integers.
///
/// Non-finite input becomes `null`.
///
/// ```
/// use tale_expr::number_value;
///
/// assert_eq!(number_value(3.0), serde_json::json!(3));
/// assert_eq!(number_value(0.5), serde_json::json!(0.5));
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// Format a number the way it reads in prose (`3`, not `3.0`).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn display_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

/// Truthiness: `null`, `false`, `0`, and `""` are falsy; everything else is truthy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numeric coercion. Returns `None` for values with no numeric reading.
#[must_use]
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
            }
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Text form used by `show` and string concatenation.
#[must_use]
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.as_f64().map_or_else(|| n.to_string(), display_number),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(to_display_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Loose equality (`==`): numbers compare by value, strings and booleans are
/// coerced when compared against numbers.
#[must_use]
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(_) | Value::Bool(_) | Value::String(_), Value::Number(_) | Value::Bool(_) | Value::String(_)) => {
            match (to_number(left), to_number(right)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => strict_eq(left, right),
    }
}

/// Strict equality (`===`): same JSON type and equal content; integers and
/// floats with the same value are equal.
#[must_use]
pub fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| strict_eq(v, other)))
        }
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&Value::Null));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!([])));
    }

    #[test]
    fn test_loose_eq_coerces_numbers() {
        assert!(loose_eq(&json!("5"), &json!(5)));
        assert!(loose_eq(&json!(1), &json!(true)));
        assert!(loose_eq(&json!(2), &json!(2.0)));
        assert!(!loose_eq(&json!("a"), &json!(0)));
        assert!(!loose_eq(&Value::Null, &json!(0)));
    }

    #[test]
    fn test_strict_eq() {
        assert!(strict_eq(&json!(2), &json!(2.0)));
        assert!(!strict_eq(&json!("2"), &json!(2)));
        assert!(strict_eq(&json!({"a": [1]}), &json!({"a": [1.0]})));
    }

    #[test]
    fn test_display() {
        assert_eq!(to_display_string(&json!(4.0)), "4");
        assert_eq!(to_display_string(&json!([1, "a"])), "1,a");
        assert_eq!(to_display_string(&Value::Null), "");
    }
}
