//! Replay of stored blocks.
//!
//! Trigger actions, hooks and watchers are stored as serialized node lists.
//! The [`BlockRunner`] resolves a fresh copy of such a list each time it
//! runs, through a [`Pipeline`] cached per registry.

use std::sync::{Arc, Weak};

use tale_syntax::Node;

use crate::context::Env;
use crate::pipeline::Pipeline;
use crate::registry::HandlerRegistry;

/// Runs node blocks through registry-specific pipelines.
///
/// Pipelines are keyed by the identity of the registry `Arc`. Entries whose
/// registry has been dropped are pruned before every lookup, so a new
/// registry allocated at a recycled address never picks up a stale entry.
#[derive(Debug, Default)]
pub struct BlockRunner {
    cache: Vec<(Weak<HandlerRegistry>, Arc<Pipeline>)>,
}

impl BlockRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached pipeline for `registry`, built without the normalizer on
    /// first use.
    pub fn pipeline_for(&mut self, registry: &Arc<HandlerRegistry>) -> Arc<Pipeline> {
        self.cache.retain(|(weak, _)| weak.strong_count() > 0);
        if let Some((_, pipeline)) = self
            .cache
            .iter()
            .find(|(weak, _)| weak.upgrade().is_some_and(|live| Arc::ptr_eq(&live, registry)))
        {
            tracing::debug!("block pipeline cache hit");
            return Arc::clone(pipeline);
        }
        let pipeline = Arc::new(Pipeline::new(registry).with_normalize(false));
        self.cache.push((Arc::downgrade(registry), Arc::clone(&pipeline)));
        pipeline
    }

    /// Resolve a deep copy of `nodes` with `registry` and return it.
    pub fn run(&mut self, nodes: &[Node], registry: &Arc<HandlerRegistry>, env: Env<'_>) -> Vec<Node> {
        let pipeline = self.pipeline_for(registry);
        let mut block = nodes.to_vec();
        pipeline.resolve(&mut block, env);
        block
    }

    /// Number of live cached pipelines.
    #[must_use]
    pub fn cached_pipelines(&self) -> usize {
        self.cache
            .iter()
            .filter(|(weak, _)| weak.strong_count() > 0)
            .count()
    }
}
