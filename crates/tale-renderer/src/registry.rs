//! Handler registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tale_syntax::Node;

use crate::context::HandlerContext;
use crate::dispatch::Flow;

/// Semantics of one directive name.
///
/// A handler receives the sibling list containing the directive and the
/// directive's index. It may rewrite, replace or remove the node and must
/// tell the dispatcher where to continue through the returned [`Flow`].
/// Errors are recorded with [`HandlerContext::add_error`], never raised.
pub trait DirectiveHandler: Send + Sync {
    fn handle(&self, cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow;
}

impl<F> DirectiveHandler for F
where
    F: Fn(&mut HandlerContext<'_>, &mut Vec<Node>, usize) -> Flow + Send + Sync,
{
    fn handle(&self, cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
        self(cx, siblings, index)
    }
}

/// What happens to directives with no registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fallback {
    /// Keep them as their source text.
    #[default]
    PassThrough,
    /// Record an error and drop them.
    Reject,
}

/// Directive name to handler mapping.
///
/// Registries are shared as `Arc<HandlerRegistry>`; the block runner caches
/// its pipelines by the identity of that `Arc`.
///
/// # Example
///
/// ```
/// use tale_renderer::{Fallback, Flow, HandlerContext, HandlerRegistry};
/// use tale_syntax::Node;
///
/// fn noop(_cx: &mut HandlerContext<'_>, _siblings: &mut Vec<Node>, _index: usize) -> Flow {
///     Flow::Skip
/// }
///
/// let mut registry = HandlerRegistry::new(Fallback::Reject);
/// registry.register("noop", noop);
/// assert!(registry.contains("noop"));
/// assert!(!registry.contains("set"));
/// ```
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn DirectiveHandler>>,
    fallback: Fallback,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(fallback: Fallback) -> Self {
        Self {
            handlers: HashMap::new(),
            fallback,
        }
    }

    /// Registry with every built-in directive; unknown names pass through.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new(Fallback::PassThrough);
        crate::handlers::register_all(&mut registry);
        registry
    }

    /// Restricted registry for `effect` blocks and watchers: state and
    /// control flow only; anything else is rejected.
    #[must_use]
    pub fn effects() -> Self {
        let mut registry = Self::new(Fallback::Reject);
        crate::handlers::register_effect_subset(&mut registry);
        registry
    }

    /// Register (or replace) the handler for `name`.
    pub fn register(&mut self, name: &str, handler: impl DirectiveHandler + 'static) -> &mut Self {
        self.handlers.insert(name.to_owned(), Arc::new(handler));
        self
    }

    /// Handler for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn DirectiveHandler>> {
        self.handlers.get(name).map(Arc::clone)
    }

    /// Whether `name` has a handler.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Behavior for unknown names.
    #[must_use]
    pub fn fallback(&self) -> Fallback {
        self.fallback
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .field("fallback", &self.fallback)
            .finish()
    }
}
