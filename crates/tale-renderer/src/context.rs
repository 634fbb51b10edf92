//! State visible to directive handlers during a resolution pass.

use std::sync::Arc;

use serde_json::{Map, Value};
use tale_expr::{ChainScope, ExprError, Scope, get_compiled_expression};
use tale_state::StateManager;
use tale_syntax::{Node, parse_typed_value};

use crate::dispatch::resolve_nodes;
use crate::presets::Presets;
use crate::registry::HandlerRegistry;
use crate::watch::WatchRegistry;

/// Mutable session parts lent to one resolution pass.
pub struct Env<'a> {
    /// The game state.
    pub state: &'a mut StateManager,
    /// Watchers registered by `effect` directives.
    pub watchers: &'a mut WatchRegistry,
    /// Attribute presets registered by `preset` directives.
    pub presets: &'a mut Presets,
    /// Registry for `effect` bodies.
    pub effects: Arc<HandlerRegistry>,
    /// Dispatch step budget for the pass.
    pub max_steps: usize,
}

/// Context passed to every [`DirectiveHandler`](crate::DirectiveHandler).
pub struct HandlerContext<'a> {
    /// The game state.
    pub state: &'a mut StateManager,
    /// Watchers registered so far.
    pub watchers: &'a mut WatchRegistry,
    /// Attribute presets.
    pub presets: &'a mut Presets,
    registry: Arc<HandlerRegistry>,
    effects: Arc<HandlerRegistry>,
    locals: Vec<Map<String, Value>>,
    steps: usize,
    max_steps: usize,
    exhausted: bool,
}

impl<'a> HandlerContext<'a> {
    /// Start a pass dispatching through `registry`.
    #[must_use]
    pub fn new(env: Env<'a>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            state: env.state,
            watchers: env.watchers,
            presets: env.presets,
            registry,
            effects: env.effects,
            locals: Vec::new(),
            steps: 0,
            max_steps: env.max_steps,
            exhausted: false,
        }
    }

    /// Registry currently dispatching.
    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Restricted registry for effect bodies.
    #[must_use]
    pub fn effects(&self) -> Arc<HandlerRegistry> {
        Arc::clone(&self.effects)
    }

    /// Resolve `nodes` in place with the current registry.
    pub fn resolve(&mut self, nodes: &mut Vec<Node>) {
        resolve_nodes(self, nodes);
    }

    /// Resolve `nodes` in place with `registry`, then switch back.
    pub fn resolve_with(&mut self, registry: &Arc<HandlerRegistry>, nodes: &mut Vec<Node>) {
        let previous = std::mem::replace(&mut self.registry, Arc::clone(registry));
        resolve_nodes(self, nodes);
        self.registry = previous;
    }

    /// Run `f` with an extra frame of local variables (loop bindings).
    pub fn with_locals<R>(&mut self, frame: Map<String, Value>, f: impl FnOnce(&mut Self) -> R) -> R {
        self.locals.push(frame);
        let result = f(self);
        self.locals.pop();
        result
    }

    /// Evaluate `source` strictly over locals and state.
    pub fn eval(&self, source: &str) -> Result<Value, ExprError> {
        let compiled = get_compiled_expression(source)?;
        let scope = ChainScope::new(&self.locals, &*self.state);
        compiled.eval(&scope)
    }

    /// Evaluate `source`, reading undefined names as `null`.
    pub fn eval_lenient(&self, source: &str) -> Result<Value, ExprError> {
        let compiled = get_compiled_expression(source)?;
        let scope = ChainScope::new(&self.locals, &*self.state);
        compiled.eval_lenient(&scope)
    }

    /// Truthiness of a condition. Failures are recorded and read as false.
    pub fn eval_condition(&mut self, source: &str) -> bool {
        match self.eval_lenient(source) {
            Ok(value) => tale_expr::is_truthy(&value),
            Err(err) => {
                self.add_error(format!("condition `{source}`: {err}"));
                false
            }
        }
    }

    /// Coerce a raw attribute value with locals and state in scope.
    #[must_use]
    pub fn typed_value(&self, raw: &str) -> Value {
        let chain = ChainScope::new(&self.locals, &*self.state);
        let scope: &dyn Scope = &chain;
        parse_typed_value(raw, Some(scope))
    }

    /// Value at a dotted path, looking in loop locals before the state.
    ///
    /// Returns `None` for paths that are not plain key paths, so callers can
    /// fall back to expression evaluation.
    #[must_use]
    pub fn lookup_path(&self, path: &str) -> Option<Value> {
        let path = path.trim();
        let mut segments = path.split('.');
        let root = segments.next()?;
        if let Some(local) = self.locals.iter().rev().find_map(|frame| frame.get(root)) {
            return segments.try_fold(local, |value, segment| match value {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
            .cloned();
        }
        self.state.get_value(path).cloned()
    }

    /// Record an error in the session error channel.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.state.add_error(message);
    }

    /// Dispatch budget for the pass.
    #[must_use]
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Count one dispatch step. Returns `false` once the budget is spent;
    /// the first overrun is recorded as an error.
    pub fn step(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        self.steps += 1;
        if self.steps > self.max_steps {
            self.exhausted = true;
            let limit = self.max_steps;
            self.add_error(format!("step budget of {limit} exceeded; resolution stopped"));
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Parts {
        state: StateManager,
        watchers: WatchRegistry,
        presets: Presets,
    }

    impl Parts {
        fn new(data: Value) -> Self {
            let Value::Object(map) = data else {
                panic!("state must be an object");
            };
            Self {
                state: StateManager::with_data(map),
                watchers: WatchRegistry::new(),
                presets: Presets::new(),
            }
        }

        fn context(&mut self, max_steps: usize) -> HandlerContext<'_> {
            let env = Env {
                state: &mut self.state,
                watchers: &mut self.watchers,
                presets: &mut self.presets,
                effects: Arc::new(HandlerRegistry::effects()),
                max_steps,
            };
            HandlerContext::new(env, Arc::new(HandlerRegistry::with_defaults()))
        }
    }

    #[test]
    fn test_locals_shadow_state() {
        let mut parts = Parts::new(json!({"x": 1, "player": {"hp": 3}}));
        let mut cx = parts.context(100);
        let mut frame = Map::new();
        frame.insert("x".to_owned(), json!({"name": "local"}));
        let seen = cx.with_locals(frame, |cx| {
            (cx.lookup_path("x.name"), cx.eval("player.hp + 1"))
        });
        assert_eq!(seen, (Some(json!("local")), Ok(json!(4))));
        assert_eq!(cx.lookup_path("x"), Some(json!(1)));
    }

    #[test]
    fn test_failed_condition_is_false_and_logged() {
        let mut parts = Parts::new(json!({}));
        let mut cx = parts.context(100);
        assert!(!cx.eval_condition("1 +"));
        assert!(!cx.eval_condition("never_set"));
        assert_eq!(parts.state.errors().len(), 1);
    }

    #[test]
    fn test_step_budget_reports_once() {
        let mut parts = Parts::new(json!({}));
        let mut cx = parts.context(2);
        assert!(cx.step());
        assert!(cx.step());
        assert!(!cx.step());
        assert!(!cx.step());
        assert_eq!(parts.state.errors().len(), 1);
    }
}
