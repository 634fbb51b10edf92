//! State directives: `set`, `unset`, `increment`, `push`, `createRange` and
//! `array`.
//!
//! Each one removes itself from the tree after running.

use serde_json::{Value, json};
use tale_expr::number_value;
use tale_state::{SetOptions, StateError};
use tale_syntax::Node;

use crate::context::HandlerContext;
use crate::dispatch::Flow;
use crate::schema::{AttrType, AttributeSchema, ExtractOptions, Extracted, extract_attributes};

fn extract_keyed(
    cx: &mut HandlerContext<'_>,
    siblings: &mut Vec<Node>,
    index: usize,
    schema: &AttributeSchema,
) -> Option<(String, Extracted)> {
    let mut attrs = extract_attributes(cx, siblings, index, schema, ExtractOptions::keyed("key"))?;
    siblings.remove(index);
    let key = attrs.key.take()?;
    Some((key, attrs))
}

fn report(cx: &mut HandlerContext<'_>, directive: &str, key: &str, result: Result<bool, StateError>) {
    if let Err(err) = result {
        cx.add_error(format!("{directive} `{key}`: {err}"));
    }
}

/// `::set{key=gold value="gold + 10" lock}`
pub(crate) fn set(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let schema = AttributeSchema::new()
        .required("value", AttrType::Any)
        .with_default("lock", AttrType::Boolean, Value::Bool(false));
    let Some((key, mut attrs)) = extract_keyed(cx, siblings, index, &schema) else {
        return Flow::ResumeAt(index);
    };
    let options = SetOptions {
        lock: attrs.flag("lock"),
    };
    let value = attrs.take("value").unwrap_or(Value::Null);
    let result = cx.state.set_value(&key, value, options);
    report(cx, "set", &key, result);
    Flow::ResumeAt(index)
}

/// `:unset[gold]` or `::unset{key=gold}`
pub(crate) fn unset(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let is_inline = siblings[index]
        .as_directive()
        .is_some_and(tale_syntax::DirectiveNode::is_inline_form);
    if !is_inline {
        cx.add_error("unset must be used as a leaf or text directive");
        siblings.remove(index);
        return Flow::ResumeAt(index);
    }
    let Some((key, _)) = extract_keyed(cx, siblings, index, &AttributeSchema::new()) else {
        return Flow::ResumeAt(index);
    };
    let result = cx.state.unset_value(&key);
    report(cx, "unset", &key, result);
    Flow::ResumeAt(index)
}

/// `::increment{key=gold amount=5}`. Ranges stay clamped; a missing value
/// counts from zero.
pub(crate) fn increment(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let schema = AttributeSchema::new().with_default("amount", AttrType::Number, json!(1));
    let Some((key, attrs)) = extract_keyed(cx, siblings, index, &schema) else {
        return Flow::ResumeAt(index);
    };
    let amount = attrs.f64("amount").unwrap_or(1.0);

    if let Some(range) = cx.state.get_range(&key) {
        let result = cx.state.set_range(&key, range.min, range.max, range.value + amount);
        report(cx, "increment", &key, result);
        return Flow::ResumeAt(index);
    }
    let current = match cx.state.get_value(&key) {
        None | Some(Value::Null) => 0.0,
        Some(value) => match value.as_f64() {
            Some(n) => n,
            None => {
                cx.add_error(format!("increment `{key}`: value is not a number"));
                return Flow::ResumeAt(index);
            }
        },
    };
    let result = cx.state.set_value(&key, number_value(current + amount), SetOptions::default());
    report(cx, "increment", &key, result);
    Flow::ResumeAt(index)
}

/// `::push{key=inventory value="'rope'"}`
pub(crate) fn push(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let schema = AttributeSchema::new().required("value", AttrType::Any);
    let Some((key, mut attrs)) = extract_keyed(cx, siblings, index, &schema) else {
        return Flow::ResumeAt(index);
    };
    let mut items = match cx.state.get_value(&key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            cx.add_error(format!("push `{key}`: value is not an array"));
            return Flow::ResumeAt(index);
        }
    };
    items.push(attrs.take("value").unwrap_or(Value::Null));
    let result = cx.state.set_value(&key, Value::Array(items), SetOptions::default());
    report(cx, "push", &key, result);
    Flow::ResumeAt(index)
}

/// `::createRange{key=hp min=0 max=10 value=5}`; `value` defaults to `min`.
pub(crate) fn create_range(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let schema = AttributeSchema::new()
        .required("min", AttrType::Number)
        .required("max", AttrType::Number)
        .optional("value", AttrType::Number);
    let Some((key, attrs)) = extract_keyed(cx, siblings, index, &schema) else {
        return Flow::ResumeAt(index);
    };
    let min = attrs.f64("min").unwrap_or(0.0);
    let max = attrs.f64("max").unwrap_or(0.0);
    let value = attrs.f64("value").unwrap_or(min);
    let result = cx.state.set_range(&key, min, max, value);
    report(cx, "createRange", &key, result);
    Flow::ResumeAt(index)
}

/// `::array{key=party value="ada, bob"}`
pub(crate) fn array(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let schema = AttributeSchema::new().with_default("value", AttrType::Array, json!([]));
    let Some((key, mut attrs)) = extract_keyed(cx, siblings, index, &schema) else {
        return Flow::ResumeAt(index);
    };
    let value = attrs.take("value").unwrap_or_else(|| json!([]));
    let result = cx.state.set_value(&key, value, SetOptions::default());
    report(cx, "array", &key, result);
    Flow::ResumeAt(index)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::Env;
    use crate::dispatch::resolve_nodes;
    use crate::presets::Presets;
    use crate::registry::HandlerRegistry;
    use crate::watch::WatchRegistry;
    use pretty_assertions::assert_eq;
    use tale_state::StateManager;
    use tale_syntax::parse_document;

    fn run(text: &str, state: &mut StateManager) -> Vec<Node> {
        let mut watchers = WatchRegistry::new();
        let mut presets = Presets::new();
        let env = Env {
            state,
            watchers: &mut watchers,
            presets: &mut presets,
            effects: Arc::new(HandlerRegistry::effects()),
            max_steps: 1_000,
        };
        let mut nodes = parse_document(text).children;
        let mut cx = HandlerContext::new(env, Arc::new(HandlerRegistry::with_defaults()));
        resolve_nodes(&mut cx, &mut nodes);
        nodes
    }

    #[test]
    fn test_set_evaluates_and_locks() {
        let mut state = StateManager::new();
        let nodes = run(
            "::set{key=gold value=5}\n::set{key=gold value=\"gold * 2\" lock}\n::set{key=gold value=0}",
            &mut state,
        );
        assert!(nodes.is_empty());
        assert_eq!(state.get_value("gold"), Some(&json!(10)));
        assert!(state.is_locked("gold"));
        assert!(state.errors().is_empty());
    }

    #[test]
    fn test_set_key_from_label() {
        let mut state = StateManager::new();
        run("::set[player.name]{value='Ada'}", &mut state);
        assert_eq!(state.get_value("player.name"), Some(&json!("Ada")));
    }

    #[test]
    fn test_unset_rejects_container_form() {
        let mut state = StateManager::new();
        run("::set{key=gold value=1}\n:::unset\ngold\n:::", &mut state);
        assert_eq!(state.get_value("gold"), Some(&json!(1)));
        assert_eq!(state.errors().len(), 1);

        run("::unset[gold]", &mut state);
        assert_eq!(state.get_value("gold"), None);
    }

    #[test]
    fn test_increment() {
        let mut state = StateManager::new();
        run("::increment{key=visits}\n::increment{key=visits amount=4}", &mut state);
        assert_eq!(state.get_value("visits"), Some(&json!(5)));

        run("::set{key=name value=Ada}\n::increment{key=name}", &mut state);
        assert_eq!(state.get_value("name"), Some(&json!("Ada")));
        assert_eq!(state.errors().len(), 1);
    }

    #[test]
    fn test_increment_clamps_ranges() {
        let mut state = StateManager::new();
        run("::createRange{key=hp min=0 max=10 value=8}\n::increment{key=hp amount=5}", &mut state);
        assert_eq!(state.get_range("hp").map(|r| r.value), Some(10.0));
        let writes = state.write_count();
        run("::increment{key=hp}", &mut state);
        assert_eq!(state.write_count(), writes);
    }

    #[test]
    fn test_create_range_defaults_value_to_min() {
        let mut state = StateManager::new();
        run("::createRange{key=mood min=-2 max=2}", &mut state);
        assert_eq!(state.get_value("mood"), Some(&json!({"min": -2, "max": 2, "value": -2})));

        run("::createRange{key=bad min=5 max=1}", &mut state);
        assert_eq!(state.get_value("bad"), None);
        assert_eq!(state.errors().len(), 1);
    }

    #[test]
    fn test_push_and_array() {
        let mut state = StateManager::new();
        run(
            "::array{key=party value=\"ada, bob\"}\n::push{key=party value=\"'cy'\"}\n::push{key=bag value=1}",
            &mut state,
        );
        assert_eq!(state.get_value("party"), Some(&json!(["ada", "bob", "cy"])));
        assert_eq!(state.get_value("bag"), Some(&json!([1])));

        run("::push{key=party.0 value=1}", &mut state);
        assert_eq!(state.errors().len(), 1);
    }
}
