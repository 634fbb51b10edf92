//! Parse and resolve passes bound to one registry.

use std::sync::{Arc, Weak};

use tale_syntax::{Document, Node, normalize, parse_document};

use crate::context::{Env, HandlerContext};
use crate::dispatch::resolve_nodes;
use crate::registry::HandlerRegistry;

/// Normalizer, AST builder and dispatcher configured for one registry.
///
/// The registry is held weakly; resolving after it has been dropped does
/// nothing.
#[derive(Debug, Clone)]
pub struct Pipeline {
    registry: Weak<HandlerRegistry>,
    normalize: bool,
}

impl Pipeline {
    /// Pipeline for `registry` with indentation normalization on.
    #[must_use]
    pub fn new(registry: &Arc<HandlerRegistry>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            normalize: true,
        }
    }

    /// Turn the indentation normalizer on or off.
    #[must_use]
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Whether passage text is normalized before parsing.
    #[must_use]
    pub fn normalizes(&self) -> bool {
        self.normalize
    }

    /// Whether this pipeline dispatches through `registry`.
    #[must_use]
    pub fn serves(&self, registry: &Arc<HandlerRegistry>) -> bool {
        std::ptr::eq(self.registry.as_ptr(), Arc::as_ptr(registry))
    }

    /// Parse passage text.
    #[must_use]
    pub fn parse(&self, text: &str) -> Document {
        if self.normalize {
            parse_document(&normalize(text))
        } else {
            parse_document(text)
        }
    }

    /// Resolve `nodes` in place. Returns `false` when the registry is gone.
    pub fn resolve(&self, nodes: &mut Vec<Node>, env: Env<'_>) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            tracing::warn!("handler registry dropped; block left unresolved");
            return false;
        };
        let mut cx = HandlerContext::new(env, registry);
        resolve_nodes(&mut cx, nodes);
        true
    }

    /// Parse and resolve passage text.
    pub fn process(&self, text: &str, env: Env<'_>) -> Document {
        let mut document = self.parse(text);
        self.resolve(&mut document.children, env);
        document
    }
}
