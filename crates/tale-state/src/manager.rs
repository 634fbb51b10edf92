//! The state store.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde_json::{Map, Value};

use crate::path::{self, KeyPath};
use crate::range::RangeValue;
use crate::scope::{Change, StateScope};
use crate::snapshot::SessionSnapshot;
use crate::StateError;

/// Options for [`StateManager::set_value`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Lock the path after writing it.
    pub lock: bool,
}

impl SetOptions {
    /// Write, then lock.
    #[must_use]
    pub fn locked() -> Self {
        Self { lock: true }
    }
}

/// Notification that one write touched `keys`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Store revision after the write.
    pub revision: u64,
    /// Key paths written.
    pub keys: BTreeSet<String>,
}

impl ChangeEvent {
    /// Whether a watcher of `path` should react: some written key equals
    /// `path`, lies under it, or contains it.
    #[must_use]
    pub fn touches(&self, path: &str) -> bool {
        let Ok(watched) = KeyPath::parse(path) else {
            return false;
        };
        self.keys.iter().any(|key| {
            KeyPath::parse(key)
                .is_ok_and(|key| key.starts_with(&watched) || watched.starts_with(&key))
        })
    }
}

/// Path-addressed game state.
///
/// Every successful write bumps the revision, records the touched keys in
/// [`modified_keys`](Self::modified_keys), and queues one [`ChangeEvent`].
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tale_state::{SetOptions, StateManager};
///
/// let mut state = StateManager::new();
/// state.set_value("player.hp", json!(10), SetOptions::locked()).unwrap();
/// assert_eq!(state.get_value("player.hp"), Some(&json!(10)));
///
/// // Locked paths ignore writes.
/// assert!(!state.set_value("player.hp", json!(0), SetOptions::default()).unwrap());
/// assert_eq!(state.write_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct StateManager {
    data: Map<String, Value>,
    initial: Map<String, Value>,
    locked: BTreeMap<String, bool>,
    once: BTreeMap<String, bool>,
    checkpoints: BTreeMap<String, Map<String, Value>>,
    errors: Vec<String>,
    modified: BTreeSet<String>,
    events: VecDeque<ChangeEvent>,
    revision: u64,
    writes: u64,
}

impl StateManager {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose data (and reset target) is `data`.
    #[must_use]
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self {
            initial: data.clone(),
            data,
            ..Self::default()
        }
    }

    /// Restore a store from a snapshot. The snapshot's data becomes the
    /// reset target.
    #[must_use]
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        let mut state = Self::with_data(snapshot.game_data);
        state.locked = snapshot.locked_keys;
        state.once = snapshot.once_keys;
        state.checkpoints = snapshot.checkpoints;
        state.errors = snapshot.errors;
        state
    }

    /// Capture everything needed to resume this session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            game_data: self.data.clone(),
            locked_keys: self.locked.clone(),
            once_keys: self.once.clone(),
            checkpoints: self.checkpoints.clone(),
            errors: self.errors.clone(),
        }
    }

    /// Replace the current session with `snapshot`, keeping the reset target.
    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        let keys = union_keys(&self.data, &snapshot.game_data);
        self.data = snapshot.game_data;
        self.locked = snapshot.locked_keys;
        self.once = snapshot.once_keys;
        self.checkpoints = snapshot.checkpoints;
        self.errors = snapshot.errors;
        self.commit(keys);
    }

    /// The full data tree.
    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Read the value at `path`. Malformed paths read as absent.
    #[must_use]
    pub fn get_value(&self, path: &str) -> Option<&Value> {
        let key = KeyPath::parse(path).ok()?;
        path::get(&self.data, &key)
    }

    /// Write `value` at `path`.
    ///
    /// Returns `false` without writing when the path (or an ancestor) is
    /// locked.
    pub fn set_value(
        &mut self,
        path: &str,
        value: Value,
        options: SetOptions,
    ) -> Result<bool, StateError> {
        let key = KeyPath::parse(path)?;
        if self.is_path_locked(&key) {
            tracing::debug!(path, "ignoring write to locked path");
            return Ok(false);
        }
        path::set(&mut self.data, &key, value)?;
        if options.lock {
            self.locked.insert(key.to_string(), true);
        }
        self.commit(BTreeSet::from([key.to_string()]));
        Ok(true)
    }

    /// Remove the value at `path`, pruning empty parent objects.
    ///
    /// Returns whether anything was removed.
    pub fn unset_value(&mut self, path: &str) -> Result<bool, StateError> {
        let key = KeyPath::parse(path)?;
        if self.is_path_locked(&key) {
            tracing::debug!(path, "ignoring unset of locked path");
            return Ok(false);
        }
        if !path::unset(&mut self.data, &key) {
            return Ok(false);
        }
        self.commit(BTreeSet::from([key.to_string()]));
        Ok(true)
    }

    /// Store a range at `path`, clamping `value` into bounds.
    ///
    /// Writing a range equal to the stored one is a no-op and queues no
    /// event.
    pub fn set_range(
        &mut self,
        path: &str,
        min: f64,
        max: f64,
        value: f64,
    ) -> Result<bool, StateError> {
        let range = RangeValue::new(min, max, value).ok_or_else(|| StateError::InvalidRange {
            path: path.to_owned(),
            min,
            max,
        })?;
        if self.get_range(path) == Some(range) {
            return Ok(false);
        }
        self.set_value(path, range.to_value(), SetOptions::default())
    }

    /// The range stored at `path`, if any.
    #[must_use]
    pub fn get_range(&self, path: &str) -> Option<RangeValue> {
        self.get_value(path).and_then(RangeValue::from_value)
    }

    /// Lock `path` and everything below it against writes.
    pub fn lock(&mut self, path: &str) -> Result<(), StateError> {
        let key = KeyPath::parse(path)?;
        self.locked.insert(key.to_string(), true);
        Ok(())
    }

    /// Remove a lock set on exactly `path`.
    pub fn unlock(&mut self, path: &str) {
        if let Ok(key) = KeyPath::parse(path) {
            self.locked.remove(&key.to_string());
        }
    }

    /// Whether `path` or one of its ancestors is locked.
    #[must_use]
    pub fn is_locked(&self, path: &str) -> bool {
        KeyPath::parse(path).is_ok_and(|key| self.is_path_locked(&key))
    }

    pub(crate) fn is_path_locked(&self, key: &KeyPath) -> bool {
        let segments = key.segments();
        (1..=segments.len())
            .any(|n| self.locked.get(&segments[..n].join(".")).copied() == Some(true))
    }

    /// Locked key paths.
    #[must_use]
    pub fn locked_keys(&self) -> &BTreeMap<String, bool> {
        &self.locked
    }

    /// Record that the `once`-guarded directive `key` has run.
    pub fn mark_once(&mut self, key: &str) {
        self.once.insert(key.to_owned(), true);
    }

    /// Whether `key` was marked by [`mark_once`](Self::mark_once).
    #[must_use]
    pub fn is_once(&self, key: &str) -> bool {
        self.once.get(key).copied() == Some(true)
    }

    /// Open an isolated working copy.
    #[must_use]
    pub fn create_scope(&self) -> StateScope<'_> {
        StateScope::new(self)
    }

    /// Apply a change list as one write.
    ///
    /// Changes to locked paths are skipped. If any change fails the store is
    /// left untouched. Returns the number of distinct keys changed; when
    /// non-zero exactly one [`ChangeEvent`] is queued.
    pub fn apply_changes(&mut self, changes: &[Change]) -> Result<usize, StateError> {
        let mut next = self.data.clone();
        let mut keys = BTreeSet::new();
        for change in changes {
            let key = KeyPath::parse(&change.path)?;
            if self.is_path_locked(&key) {
                continue;
            }
            if change.apply_to(&mut next)? {
                keys.insert(key.to_string());
            }
        }
        let applied = keys.len();
        if applied > 0 {
            self.data = next;
            self.commit(keys);
        }
        Ok(applied)
    }

    /// Top-level keys written since the last
    /// [`clear_modified`](Self::clear_modified).
    #[must_use]
    pub fn modified_keys(&self) -> &BTreeSet<String> {
        &self.modified
    }

    /// Forget the modified-key set.
    pub fn clear_modified(&mut self) {
        self.modified.clear();
    }

    /// Drain queued change events, oldest first.
    pub fn take_events(&mut self) -> Vec<ChangeEvent> {
        self.events.drain(..).collect()
    }

    /// Whether change events are waiting.
    #[must_use]
    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Current revision; increases with every write.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of writes performed.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Append to the error log.
    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(error = %message, "directive error");
        self.errors.push(message);
    }

    /// The error log.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Empty the error log.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Save a named copy of the data.
    pub fn save_checkpoint(&mut self, name: &str) {
        self.checkpoints.insert(name.to_owned(), self.data.clone());
    }

    /// Replace the data with a saved checkpoint.
    pub fn load_checkpoint(&mut self, name: &str) -> Result<(), StateError> {
        let saved = self
            .checkpoints
            .get(name)
            .cloned()
            .ok_or_else(|| StateError::UnknownCheckpoint(name.to_owned()))?;
        let keys = union_keys(&self.data, &saved);
        self.data = saved;
        self.commit(keys);
        Ok(())
    }

    /// Names of saved checkpoints.
    pub fn checkpoints(&self) -> impl Iterator<Item = &str> {
        self.checkpoints.keys().map(String::as_str)
    }

    /// Return to the initial data, dropping locks, once-markers and errors.
    /// Checkpoints survive.
    pub fn reset(&mut self) {
        let keys = union_keys(&self.data, &self.initial);
        self.data = self.initial.clone();
        self.locked.clear();
        self.once.clear();
        self.errors.clear();
        self.commit(keys);
    }

    fn commit(&mut self, keys: BTreeSet<String>) {
        if keys.is_empty() {
            return;
        }
        self.writes += 1;
        self.revision += 1;
        tracing::trace!(revision = self.revision, ?keys, "state write");
        self.modified.extend(keys.iter().map(|key| top_level(key)));
        self.events.push_back(ChangeEvent {
            revision: self.revision,
            keys,
        });
    }
}

fn top_level(key: &str) -> String {
    KeyPath::parse(key).map_or_else(|_| key.to_owned(), |path| path.root().to_owned())
}

fn union_keys(a: &Map<String, Value>, b: &Map<String, Value>) -> BTreeSet<String> {
    a.keys().chain(b.keys()).cloned().collect()
}

impl tale_expr::Scope for StateManager {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.data.get(name).cloned()
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
    fn test_lock_covers_descendants() {
        let mut state = manager(json!({"player": {"hp": 3}}));
        state.lock("player").unwrap();
        assert!(state.is_locked("player.hp"));
        assert!(!state.set_value("player.hp", json!(1), SetOptions::default()).unwrap());
        assert!(!state.unset_value("player.hp").unwrap());
        assert_eq!(state.get_value("player.hp"), Some(&json!(3)));

        state.unlock("player");
        assert!(state.set_value("player.hp", json!(1), SetOptions::default()).unwrap());
    }

    #[test]
    fn test_set_range_equal_value_is_noop() {
        let mut state = StateManager::new();
        assert!(state.set_range("hp", 0.0, 10.0, 5.0).unwrap());
        assert_eq!(state.write_count(), 1);
        assert!(!state.set_range("hp", 0.0, 10.0, 5.0).unwrap());
        assert_eq!(state.write_count(), 1);
        assert_eq!(state.take_events().len(), 1);

        assert!(state.set_range("hp", 0.0, 10.0, 50.0).unwrap());
        assert_eq!(state.get_value("hp"), Some(&json!({"min": 0, "max": 10, "value": 10})));
    }

    #[test]
    fn test_set_range_rejects_reversed_bounds() {
        let mut state = StateManager::new();
        assert!(matches!(
            state.set_range("hp", 5.0, 1.0, 3.0),
            Err(StateError::InvalidRange { .. })
        ));
        assert_eq!(state.write_count(), 0);
    }

    #[test]
    fn test_failed_write_leaves_store_untouched() {
        let mut state = manager(json!({"gold": 5}));
        assert!(state.set_value("gold.coins", json!(1), SetOptions::default()).is_err());
        assert!(state.set_value("a..b", json!(1), SetOptions::default()).is_err());
        assert_eq!(Value::Object(state.data().clone()), json!({"gold": 5}));
        assert_eq!(state.write_count(), 0);
    }

    #[test]
    fn test_apply_changes_is_one_write() {
        let mut state = StateManager::new();
        let changes = {
            let mut scope = state.create_scope();
            scope.set_value("a", json!(1)).unwrap();
            scope.set_value("b", json!(2)).unwrap();
            scope.get_changes()
        };
        assert_eq!(state.apply_changes(&changes).unwrap(), 2);
        assert_eq!(state.write_count(), 1);
        let events = state.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].keys, BTreeSet::from(["a".to_owned(), "b".to_owned()]));
    }

    #[test]
    fn test_apply_changes_all_or_nothing() {
        let mut state = manager(json!({"gold": 5}));
        let changes = [Change::set("silver", json!(1)), Change::set("gold.x", json!(1))];
        assert!(state.apply_changes(&changes).is_err());
        assert_eq!(state.get_value("silver"), None);
        assert_eq!(state.write_count(), 0);
    }

    #[test]
    fn test_modified_keys_are_top_level() {
        let mut state = StateManager::new();
        state
            .set_value("player.inventory.weapon", json!("sword"), SetOptions::default())
            .unwrap();
        state.unset_value("player.inventory.weapon").unwrap();
        state.set_value("items[0]", json!(1), SetOptions::default()).unwrap();
        assert_eq!(
            state.modified_keys().iter().collect::<Vec<_>>(),
            ["items", "player"]
        );

        let events = state.take_events();
        assert!(events[0].keys.contains("player.inventory.weapon"));

        state.clear_modified();
        assert!(state.modified_keys().is_empty());
    }

    #[test]
    fn test_once_markers() {
        let mut state = StateManager::new();
        assert!(!state.is_once("intro"));
        state.mark_once("intro");
        assert!(state.is_once("intro"));
    }

    #[test]
    fn test_reset_restores_initial_data() {
        let mut state = manager(json!({"gold": 1}));
        state.set_value("gold", json!(7), SetOptions::locked()).unwrap();
        state.mark_once("intro");
        state.add_error("boom");
        state.reset();
        assert_eq!(state.get_value("gold"), Some(&json!(1)));
        assert!(!state.is_locked("gold"));
        assert!(!state.is_once("intro"));
        assert!(state.errors().is_empty());
    }

    #[test]
    fn test_snapshot_restores_session() {
        let mut state = StateManager::new();
        state.set_value("gold", json!(3), SetOptions::locked()).unwrap();
        state.mark_once("intro");
        state.save_checkpoint("start");
        state.add_error("bad directive");

        let json = state.snapshot().to_json().unwrap();
        let restored = StateManager::from_snapshot(SessionSnapshot::from_json(&json).unwrap());
        assert_eq!(restored.get_value("gold"), Some(&json!(3)));
        assert!(restored.is_locked("gold"));
        assert!(restored.is_once("intro"));
        assert_eq!(restored.checkpoints().collect::<Vec<_>>(), ["start"]);
        assert_eq!(restored.errors(), ["bad directive"]);
    }

    #[test]
    fn test_checkpoints() {
        let mut state = StateManager::new();
        state.set_value("room", json!("hall"), SetOptions::default()).unwrap();
        state.save_checkpoint("hall");
        state.set_value("room", json!("cellar"), SetOptions::default()).unwrap();
        state.load_checkpoint("hall").unwrap();
        assert_eq!(state.get_value("room"), Some(&json!("hall")));
        assert!(matches!(
            state.load_checkpoint("nowhere"),
            Err(StateError::UnknownCheckpoint(_))
        ));
    }

    #[test]
    fn test_change_event_touches_related_paths() {
        let event = ChangeEvent {
            revision: 1,
            keys: BTreeSet::from(["player.hp".to_owned()]),
        };
        assert!(event.touches("player"));
        assert!(event.touches("player.hp"));
        assert!(event.touches("player.hp.value"));
        assert!(!event.touches("player.name"));
    }
}
