//! Variable lookup for expression evaluation.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Source of variables for an expression.
///
/// Only top-level names go through the scope; member and index access is
/// resolved on the returned value.
pub trait Scope {
    /// Look up a top-level variable. `None` means the name is not defined.
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// Scope with no variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyScope;

impl Scope for EmptyScope {
    fn lookup(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl Scope for Map<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Scope for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Scope for Value {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.as_object().and_then(|map| map.get(name).cloned())
    }
}

/// Local frames layered over a parent scope.
///
/// Frames are searched innermost (last) first; the parent is consulted only
/// when no frame defines the name. Used for loop variables.
pub struct ChainScope<'a> {
    frames: &'a [Map<String, Value>],
    parent: &'a dyn Scope,
}

impl<'a> ChainScope<'a> {
    /// Layer `frames` over `parent`.
    #[must_use]
    pub fn new(frames: &'a [Map<String, Value>], parent: &'a dyn Scope) -> Self {
        Self { frames, parent }
    }
}

impl Scope for ChainScope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).cloned())
            .or_else(|| self.parent.lookup(name))
    }
}
