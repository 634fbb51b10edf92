//! Isolated write scopes.
//!
//! A [`StateScope`] is a working copy of the store. Reads see the scope's own
//! writes; the parent stays untouched until the collected [`Change`]s are
//! handed to [`StateManager::apply_changes`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::manager::StateManager;
use crate::path::{self, KeyPath};
use crate::StateError;

/// A single recorded write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Key path that was written.
    pub path: String,
    /// What happened at that path.
    pub op: ChangeOp,
}

/// Kind of write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ChangeOp {
    /// Store a value.
    Set(Value),
    /// Remove the value.
    Unset,
}

impl Change {
    /// A `set` change.
    #[must_use]
    pub fn set(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            op: ChangeOp::Set(value),
        }
    }

    /// An `unset` change.
    #[must_use]
    pub fn unset(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            op: ChangeOp::Unset,
        }
    }

    /// Apply to `root`. Returns whether the tree changed shape or content.
    pub(crate) fn apply_to(&self, root: &mut Map<String, Value>) -> Result<bool, StateError> {
        let key = KeyPath::parse(&self.path)?;
        match &self.op {
            ChangeOp::Set(value) => {
                path::set(root, &key, value.clone())?;
                Ok(true)
            }
            ChangeOp::Unset => Ok(path::unset(root, &key)),
        }
    }
}

/// Working copy of a [`StateManager`] that records its writes.
#[derive(Debug)]
pub struct StateScope<'a> {
    parent: &'a StateManager,
    working: Map<String, Value>,
    log: Vec<(KeyPath, Change)>,
}

impl<'a> StateScope<'a> {
    pub(crate) fn new(parent: &'a StateManager) -> Self {
        Self {
            parent,
            working: parent.data().clone(),
            log: Vec::new(),
        }
    }

    /// Read through the scope.
    #[must_use]
    pub fn get_value(&self, path: &str) -> Option<&Value> {
        let key = KeyPath::parse(path).ok()?;
        path::get(&self.working, &key)
    }

    /// Write into the scope. Returns `false` when the parent has the path locked.
    pub fn set_value(&mut self, path: &str, value: Value) -> Result<bool, StateError> {
        let key = KeyPath::parse(path)?;
        if self.parent.is_path_locked(&key) {
            return Ok(false);
        }
        path::set(&mut self.working, &key, value.clone())?;
        self.log.push((key, Change::set(path, value)));
        Ok(true)
    }

    /// Remove a value from the scope. Returns `false` when locked or absent.
    pub fn unset_value(&mut self, path: &str) -> Result<bool, StateError> {
        let key = KeyPath::parse(path)?;
        if self.parent.is_path_locked(&key) || !path::unset(&mut self.working, &key) {
            return Ok(false);
        }
        self.log.push((key, Change::unset(path)));
        Ok(true)
    }

    /// Minimal change list that turns the parent into this scope.
    ///
    /// Writes overwritten by a later write to the same path or an ancestor
    /// are dropped, as are writes that leave the result unchanged (setting a
    /// value the parent already holds, unsetting something never there).
    #[must_use]
    pub fn get_changes(&self) -> Vec<Change> {
        let superseded: Vec<(KeyPath, Change)> = self
            .log
            .iter()
            .enumerate()
            .filter(|(i, (key, _))| {
                !self.log[i + 1..]
                    .iter()
                    .any(|(later, _)| key.starts_with(later))
            })
            .map(|(_, entry)| entry.clone())
            .collect();

        let mut changes: Vec<Change> = superseded.into_iter().map(|(_, c)| c).collect();
        let mut i = 0;
        while i < changes.len() {
            let mut candidate = changes.clone();
            candidate.remove(i);
            if self.replays_to_working(&candidate) {
                changes = candidate;
            } else {
                i += 1;
            }
        }
        changes
    }

    /// Consume the scope, returning [`get_changes`](Self::get_changes).
    #[must_use]
    pub fn into_changes(self) -> Vec<Change> {
        self.get_changes()
    }

    fn replays_to_working(&self, changes: &[Change]) -> bool {
        let mut replay = self.parent.data().clone();
        for change in changes {
            if change.apply_to(&mut replay).is_err() {
                return false;
            }
        }
        replay == self.working
    }
}

impl tale_expr::Scope for StateScope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.working.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn manager(data: Value) -> StateManager {
        match data {
            Value::Object(map) => StateManager::with_data(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_scope_writes_invisible_to_parent() {
        let state = manager(json!({"gold": 1}));
        let mut scope = state.create_scope();
        scope.set_value("gold", json!(9)).unwrap();
        assert_eq!(scope.get_value("gold"), Some(&json!(9)));
        assert_eq!(state.get_value("gold"), Some(&json!(1)));
    }

    #[test]
    fn test_changes_collapse_overwrites() {
        let state = manager(json!({"a": 1}));
        let mut scope = state.create_scope();
        scope.set_value("a", json!(2)).unwrap();
        scope.set_value("a", json!(3)).unwrap();
        scope.set_value("b.c", json!(true)).unwrap();
        scope.unset_value("b").unwrap();
        assert_eq!(scope.get_changes(), vec![Change::set("a", json!(3))]);
    }

    #[test]
    fn test_changes_drop_no_op_writes() {
        let state = manager(json!({"a": 1}));
        let mut scope = state.create_scope();
        scope.set_value("a", json!(1)).unwrap();
        assert!(!scope.unset_value("missing").unwrap());
        assert!(scope.get_changes().is_empty());
    }

    #[test]
    fn test_changes_keep_order_dependent_writes() {
        let state = manager(json!({"a": {"b": 1, "c": 2}}));
        let mut scope = state.create_scope();
        scope.unset_value("a").unwrap();
        scope.set_value("a.b", json!(1)).unwrap();
        let changes = scope.get_changes();
        assert_eq!(changes, vec![Change::unset("a"), Change::set("a.b", json!(1))]);
    }

    #[test]
    fn test_locked_paths_not_written() {
        let mut state = manager(json!({"hp": 5}));
        state.lock("hp").unwrap();
        let mut scope = state.create_scope();
        assert!(!scope.set_value("hp", json!(0)).unwrap());
        assert!(scope.get_changes().is_empty());
    }

    #[test]
    fn test_change_serialization() {
        let json = serde_json::to_value(Change::set("gold", json!(3))).unwrap();
        assert_eq!(json, json!({"path": "gold", "op": {"kind": "set", "value": 3}}));
        let json = serde_json::to_value(Change::unset("gold")).unwrap();
        assert_eq!(json, json!({"path": "gold", "op": {"kind": "unset"}}));
    }
}
