//! Expression compiler for directive attributes and conditions.
//!
//! Directive labels such as `:::if[health > 5]` and attribute values such as
//! `{value="gold + 10"}` are small expressions over the game state. This
//! crate compiles them into an expression tree once and evaluates them against
//! any [`Scope`].
//!
//! The grammar covers literals (numbers, quoted strings, `true`/`false`,
//! `null`, arrays, objects), identifiers, member and index access, arithmetic,
//! comparisons, logical operators (`&&`, `||`, `??`), the ternary operator, and
//! a handful of numeric builtins (`min`, `max`, `abs`, `floor`, `ceil`,
//! `round`, also reachable as `Math.*`).
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tale_expr::eval_expression;
//!
//! let state = json!({"health": 3, "player": {"name": "Ada"}});
//! assert_eq!(eval_expression("health > 5", &state), Ok(json!(false)));
//! assert_eq!(eval_expression("player.name + '!'", &state), Ok(json!("Ada!")));
//! ```

mod cache;
mod error;
mod eval;
mod lexer;
mod parser;
mod scope;
mod value;

use std::sync::Arc;

pub use cache::ExpressionCache;
pub use error::ExprError;
pub use eval::CompiledExpression;
pub use scope::{ChainScope, EmptyScope, Scope};
pub use value::{
    display_number, is_truthy, loose_eq, number_value, strict_eq, to_display_string, to_number,
};

use serde_json::Value;

/// Compile `source` without consulting any cache.
pub fn compile_expression(source: &str) -> Result<CompiledExpression, ExprError> {
    CompiledExpression::compile(source)
}

/// Compiled form of `source` from the process-wide [`ExpressionCache`].
pub fn get_compiled_expression(source: &str) -> Result<Arc<CompiledExpression>, ExprError> {
    ExpressionCache::global().get(source)
}

/// Compile (cached) and evaluate `source` strictly against `scope`.
pub fn eval_expression(source: &str, scope: &dyn Scope) -> Result<Value, ExprError> {
    get_compiled_expression(source)?.eval(scope)
}

/// Clear the process-wide cache. Intended for tests.
pub fn clear_expression_cache() {
    ExpressionCache::global().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_global_cache_reuses_compiled_expression() {
        let first = get_compiled_expression("score >= 10").unwrap();
        assert_eq!(eval_expression("score >= 10", &json!({"score": 3})), Ok(json!(false)));
        assert_eq!(eval_expression("score >= 10", &json!({"score": 12})), Ok(json!(true)));
        let second = get_compiled_expression("score >= 10").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
