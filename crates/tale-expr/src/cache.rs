//! Memoized expression compilation.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use crate::{CompiledExpression, ExprError};

/// Process-wide cache used by [`get_compiled_expression`](crate::get_compiled_expression).
static GLOBAL: LazyLock<ExpressionCache> = LazyLock::new(ExpressionCache::new);

/// Cache from expression source to its compiled form.
///
/// Identical source text always yields the same [`Arc`], so callers can
/// verify hits with [`Arc::ptr_eq`]. Compilation failures are not cached.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tale_expr::ExpressionCache;
///
/// let cache = ExpressionCache::new();
/// let first = cache.get("hp + 1").unwrap();
/// let second = cache.get("hp + 1").unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
/// ```
#[derive(Debug, Default)]
pub struct ExpressionCache {
    entries: Mutex<HashMap<String, Arc<CompiledExpression>>>,
}

impl ExpressionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Return the compiled form of `source`, compiling it on first use.
    pub fn get(&self, source: &str) -> Result<Arc<CompiledExpression>, ExprError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(compiled) = entries.get(source) {
            return Ok(Arc::clone(compiled));
        }
        let compiled = Arc::new(CompiledExpression::compile(source)?);
        tracing::trace!(source, "compiled expression");
        entries.insert(source.to_owned(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Number of cached expressions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached expression.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
