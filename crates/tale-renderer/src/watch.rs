//! Watchers registered by `effect` directives.

use serde_json::Value;
use tale_state::{ChangeEvent, StateManager};
use tale_syntax::Node;

/// A block re-run when any of its keys change value.
#[derive(Debug, Clone, PartialEq)]
struct Watcher {
    keys: Vec<String>,
    block: Vec<Node>,
    last: Vec<Option<Value>>,
}

impl Watcher {
    fn observe(&self, state: &StateManager) -> Vec<Option<Value>> {
        self.keys
            .iter()
            .map(|key| state.get_value(key).cloned())
            .collect()
    }
}

/// All watchers of the current passage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchRegistry {
    watchers: Vec<Watcher>,
}

impl WatchRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch `keys`, remembering their current values.
    pub fn register(&mut self, keys: Vec<String>, block: Vec<Node>, state: &StateManager) {
        let mut watcher = Watcher {
            keys,
            block,
            last: Vec::new(),
        };
        watcher.last = watcher.observe(state);
        tracing::debug!(keys = ?watcher.keys, "watcher registered");
        self.watchers.push(watcher);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    pub fn clear(&mut self) {
        self.watchers.clear();
    }

    /// Blocks of the watchers whose keys were touched by `events` and whose
    /// values differ from what they last saw. Each watcher appears at most
    /// once however many events touched it.
    pub fn due(&mut self, events: &[ChangeEvent], state: &StateManager) -> Vec<Vec<Node>> {
        let mut due = Vec::new();
        for watcher in &mut self.watchers {
            let touched = events
                .iter()
                .any(|event| watcher.keys.iter().any(|key| event.touches(key)));
            if !touched {
                continue;
            }
            let current = watcher.observe(state);
            if current != watcher.last {
                watcher.last = current;
                due.push(watcher.block.clone());
            }
        }
        due
    }
}
