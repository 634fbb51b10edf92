//! Bounded numeric values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tale_expr::number_value;

/// A number clamped to `[min, max]`, stored in state as
/// `{"min": .., "max": .., "value": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeValue {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Current value, always within bounds.
    pub value: f64,
}

impl RangeValue {
    /// Create a range, clamping `value` into bounds.
    ///
    /// Returns `None` when bounds are reversed or not finite.
    ///
    /// ```
    /// use tale_state::RangeValue;
    ///
    /// let hp = RangeValue::new(0.0, 10.0, 14.0).unwrap();
    /// assert_eq!(hp.value, 10.0);
    /// assert!(RangeValue::new(5.0, 1.0, 3.0).is_none());
    /// ```
    #[must_use]
    pub fn new(min: f64, max: f64, value: f64) -> Option<Self> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return None;
        }
        let value = if value.is_nan() { min } else { value.clamp(min, max) };
        Some(Self { min, max, value })
    }

    /// Same bounds, new clamped value.
    #[must_use]
    pub fn with_value(self, value: f64) -> Self {
        Self {
            value: if value.is_nan() {
                self.value
            } else {
                value.clamp(self.min, self.max)
            },
            ..self
        }
    }

    /// Recognize a stored range: an object whose `min`, `max` and `value`
    /// members are all numbers.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let field = |name: &str| map.get(name).and_then(Value::as_f64);
        Some(Self {
            min: field("min")?,
            max: field("max")?,
            value: field("value")?,
        })
    }

    /// JSON form, with integral numbers written as integers.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("min".to_owned(), number_value(self.min));
        map.insert("max".to_owned(), number_value(self.max));
        map.insert("value".to_owned(), number_value(self.value));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_to_value_uses_integers() {
        let range = RangeValue::new(0.0, 10.0, 3.0).unwrap();
        assert_eq!(range.to_value(), json!({"min": 0, "max": 10, "value": 3}));
    }

    #[test]
    fn test_from_value_requires_all_fields() {
        assert_eq!(
            RangeValue::from_value(&json!({"min": 0, "max": 5, "value": 2.5})),
            Some(RangeValue { min: 0.0, max: 5.0, value: 2.5 })
        );
        assert_eq!(RangeValue::from_value(&json!({"min": 0, "max": 5})), None);
        assert_eq!(RangeValue::from_value(&json!(4)), None);
    }

    #[test]
    fn test_with_value_clamps() {
        let range = RangeValue::new(1.0, 3.0, 2.0).unwrap();
        assert_eq!(range.with_value(-4.0).value, 1.0);
        assert_eq!(range.with_value(9.0).value, 3.0);
    }
}
