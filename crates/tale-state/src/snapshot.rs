//! Serializable session state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::StateError;

/// Everything needed to resume a session: game data, locks, once-markers,
/// named checkpoints and the error log.
///
/// Serialized with camelCase keys; missing fields default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSnapshot {
    /// The game data tree.
    pub game_data: Map<String, Value>,
    /// Locked key paths.
    pub locked_keys: BTreeMap<String, bool>,
    /// Keys of `once`-guarded directives that already ran.
    pub once_keys: BTreeMap<String, bool>,
    /// Named copies of the game data.
    pub checkpoints: BTreeMap<String, Map<String, Value>>,
    /// Error log.
    pub errors: Vec<String>,
}

impl SessionSnapshot {
    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_missing_fields_default() {
        let snapshot = SessionSnapshot::from_json(r#"{"gameData": {"gold": 3}}"#).unwrap();
        assert_eq!(snapshot.game_data.get("gold"), Some(&json!(3)));
        assert!(snapshot.locked_keys.is_empty());
        assert!(snapshot.errors.is_empty());
    }

    #[test]
    fn test_camel_case_keys() {
        let mut snapshot = SessionSnapshot::default();
        snapshot.once_keys.insert("intro".to_owned(), true);
        let value: Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(value["onceKeys"], json!({"intro": true}));
        assert!(value.get("lockedKeys").is_some());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            SessionSnapshot::from_json("{not json"),
            Err(StateError::Serialization(_))
        ));
    }
}
