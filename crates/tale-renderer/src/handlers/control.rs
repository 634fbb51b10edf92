//! Control flow: `if`/`else`, `for`, `switch`/`case`/`default`, plus
//! `show`, `effect` and `preset`.
//!
//! Branching handlers splice only the selected body into the tree and
//! resume at its first node, so untaken branches never run.

use serde_json::{Map, Value};
use tale_expr::{display_number, loose_eq, to_display_string};
use tale_state::RangeValue;
use tale_syntax::{DirectiveNode, Node};

use super::{take_directive, unwrap_paragraph};
use crate::context::HandlerContext;
use crate::dispatch::Flow;

/// `:::if[cond]` with an optional `else` or `else[cond]`, either as the last
/// child or as the next sibling.
pub(crate) fn if_directive(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let Some(mut directive) = take_directive(siblings, index) else {
        return Flow::Skip;
    };
    let Some(condition) = directive.label_text().map(str::to_owned) else {
        cx.add_error("if requires a condition label");
        return Flow::ResumeAt(index);
    };

    let child_else = take_trailing_else(&mut directive.children);
    let chain = if child_else.is_none() {
        take_else_siblings(siblings, index)
    } else {
        Vec::new()
    };

    let selected = if cx.eval_condition(&condition) {
        unwrap_paragraph(directive.children)
    } else if let Some(otherwise) = child_else {
        else_branch(otherwise)
    } else {
        let mut chain = chain.into_iter();
        match chain.next() {
            Some(otherwise) if otherwise.label_text().is_some() => {
                let mut nodes = else_branch(otherwise);
                nodes.extend(chain.map(Node::Directive));
                nodes
            }
            Some(otherwise) => else_branch(otherwise),
            None => Vec::new(),
        }
    };
    siblings.splice(index..index, selected);
    Flow::ResumeAt(index)
}

/// Body of an `else`; `else[cond]` becomes a fresh `if` to be dispatched.
fn else_branch(otherwise: DirectiveNode) -> Vec<Node> {
    if otherwise.label_text().is_some() {
        return vec![Node::Directive(DirectiveNode {
            name: "if".to_owned(),
            ..otherwise
        })];
    }
    unwrap_paragraph(otherwise.children)
}

/// Detach an `else` directive that only blank text follows.
fn take_trailing_else(children: &mut Vec<Node>) -> Option<DirectiveNode> {
    let position = children.iter().rposition(|node| !node.is_blank_text())?;
    if !children[position].is_directive_named("else") {
        return None;
    }
    children.truncate(position + 1);
    match children.pop() {
        Some(Node::Directive(directive)) => Some(directive),
        _ => None,
    }
}

/// Detach the run of `else` siblings starting at `index`, up to and
/// including the first unconditional one.
fn take_else_siblings(siblings: &mut Vec<Node>, index: usize) -> Vec<DirectiveNode> {
    let mut chain = Vec::new();
    loop {
        let mut next = index;
        while siblings.get(next).is_some_and(Node::is_blank_text) {
            next += 1;
        }
        if !siblings.get(next).is_some_and(|node| node.is_directive_named("else")) {
            break;
        }
        siblings.drain(index..next);
        let Some(otherwise) = take_directive(siblings, index) else {
            break;
        };
        let conditional = otherwise.label_text().is_some();
        chain.push(otherwise);
        if !conditional {
            break;
        }
    }
    chain
}

/// `else`, `case` and `default` outside their parent directive.
pub(crate) fn orphan(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    if let Some(directive) = take_directive(siblings, index) {
        let parent = if directive.name == "else" { "if" } else { "switch" };
        cx.add_error(format!("{} without a preceding {parent}", directive.name));
    }
    Flow::ResumeAt(index)
}

/// `:::for[item in items]` or `:::for[(item, index) in items]`.
///
/// Arrays bind each element and its position, objects each value and its
/// key, and a non-negative integer `n` binds `0..n`.
pub(crate) fn for_each(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let Some(directive) = take_directive(siblings, index) else {
        return Flow::Skip;
    };
    let Some(label) = directive.label_text() else {
        cx.add_error("for requires a `name in expression` label");
        return Flow::ResumeAt(index);
    };
    let Some((item_name, index_name, source)) = parse_loop_header(label) else {
        cx.add_error(format!("for: cannot parse loop header `{label}`"));
        return Flow::ResumeAt(index);
    };
    let iterable = match cx.eval(source) {
        Ok(value) => value,
        Err(err) => {
            cx.add_error(format!("for `{source}`: {err}"));
            return Flow::ResumeAt(index);
        }
    };
    let items = match iteration_items(&iterable, cx.max_steps()) {
        Ok(items) => items,
        Err(message) => {
            cx.add_error(format!("for `{source}`: {message}"));
            return Flow::ResumeAt(index);
        }
    };

    let mut output = Vec::new();
    for (item, position) in items {
        let mut frame = Map::new();
        frame.insert(item_name.to_owned(), item);
        if let Some(index_name) = index_name {
            frame.insert(index_name.to_owned(), position);
        }
        let mut body = directive.children.clone();
        cx.with_locals(frame, |cx| cx.resolve(&mut body));
        output.extend(unwrap_paragraph(body));
    }
    let len = output.len();
    siblings.splice(index..index, output);
    Flow::ResumeAt(index + len)
}

/// Split `x in expr` or `(x, i) in expr`.
fn parse_loop_header(label: &str) -> Option<(&str, Option<&str>, &str)> {
    let (binding, source) = label.split_once(" in ")?;
    let binding = binding.trim();
    let source = source.trim();
    if source.is_empty() {
        return None;
    }
    let (item, position) = match binding.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        Some(inner) => {
            let (item, position) = inner.split_once(',')?;
            (item.trim(), Some(position.trim()))
        }
        None => (binding, None),
    };
    let valid = is_identifier(item) && position.is_none_or(is_identifier);
    valid.then_some((item, position, source))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn iteration_items(iterable: &Value, limit: usize) -> Result<Vec<(Value, Value)>, String> {
    match iterable {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.clone(), Value::from(i)))
            .collect()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(key, value)| (value.clone(), Value::String(key.clone())))
            .collect()),
        Value::Number(n) => {
            let count = n.as_f64().unwrap_or(-1.0);
            if count < 0.0 || count.fract() != 0.0 {
                return Err(format!("cannot loop {count} times"));
            }
            if count > limit as f64 {
                return Err(format!("{count} iterations exceed the step budget"));
            }
            Ok((0..count as usize)
                .map(|i| (Value::from(i), Value::from(i)))
                .collect())
        }
        other => Err(format!("cannot iterate over {}", to_display_string(other))),
    }
}

/// `:::switch[expr]` holding `case[value]` and `default` children.
pub(crate) fn switch(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let Some(directive) = take_directive(siblings, index) else {
        return Flow::Skip;
    };
    let Some(subject) = directive.label_text() else {
        cx.add_error("switch requires an expression label");
        return Flow::ResumeAt(index);
    };
    let subject = cx.eval_lenient(subject).unwrap_or_else(|err| {
        cx.add_error(format!("switch `{subject}`: {err}"));
        Value::Null
    });

    let mut fallback = None;
    let mut selected = None;
    for child in directive.children {
        let Node::Directive(branch) = child else {
            continue;
        };
        match branch.name.as_str() {
            "case" => {
                let matches = branch
                    .label_text()
                    .is_some_and(|label| loose_eq(&cx.typed_value(label), &subject));
                if matches {
                    selected = Some(branch);
                    break;
                }
            }
            "default" if fallback.is_none() => fallback = Some(branch),
            _ => {}
        }
    }
    let body = selected
        .or(fallback)
        .map(|branch| unwrap_paragraph(branch.children))
        .unwrap_or_default();
    siblings.splice(index..index, body);
    Flow::ResumeAt(index)
}

/// `:show[gold]` or `:show[gold * 2]`. Ranges show their current value.
pub(crate) fn show(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let Some(directive) = take_directive(siblings, index) else {
        return Flow::Skip;
    };
    let target = directive
        .label_text()
        .or_else(|| directive.attr("key"))
        .unwrap_or_default()
        .to_owned();
    if target.is_empty() {
        cx.add_error("show requires a key or expression");
        return Flow::ResumeAt(index);
    }
    let value = match cx.lookup_path(&target) {
        Some(value) => value,
        None => cx.eval_lenient(&target).unwrap_or_else(|err| {
            cx.add_error(format!("show `{target}`: {err}"));
            Value::Null
        }),
    };
    let text = match RangeValue::from_value(&value) {
        Some(range) => display_number(range.value),
        None => to_display_string(&value),
    };
    siblings.insert(index, Node::text(text));
    Flow::Skip
}

/// `:::effect{watch="hp, gold"}`: run the body now with the restricted
/// registry, then again whenever a watched key changes.
pub(crate) fn effect(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let Some(directive) = take_directive(siblings, index) else {
        return Flow::Skip;
    };
    let keys: Vec<String> = directive
        .attr("watch")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_owned)
        .collect();

    let effects = cx.effects();
    let mut body = directive.children.clone();
    cx.resolve_with(&effects, &mut body);
    if !keys.is_empty() {
        cx.watchers.register(keys, directive.children, &*cx.state);
    }
    Flow::ResumeAt(index)
}

/// `::preset[name]{attrs}` stores attribute defaults for components.
pub(crate) fn preset(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let Some(directive) = take_directive(siblings, index) else {
        return Flow::Skip;
    };
    let Some(name) = directive.label_text().map(str::to_owned) else {
        cx.add_error("preset requires a name label");
        return Flow::ResumeAt(index);
    };
    tracing::debug!(%name, "preset registered");
    cx.presets.insert(name, directive.attributes);
    Flow::ResumeAt(index)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::bridge::to_plain_text;
    use crate::context::Env;
    use crate::presets::Presets;
    use crate::registry::HandlerRegistry;
    use crate::watch::WatchRegistry;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tale_state::StateManager;
    use tale_syntax::parse_document;

    struct Harness {
        state: StateManager,
        watchers: WatchRegistry,
        presets: Presets,
    }

    impl Harness {
        fn new(data: Value) -> Self {
            Self {
                state: StateManager::with_data(data.as_object().cloned().unwrap_or_default()),
                watchers: WatchRegistry::new(),
                presets: Presets::new(),
            }
        }

        fn render(&mut self, text: &str) -> String {
            let env = Env {
                state: &mut self.state,
                watchers: &mut self.watchers,
                presets: &mut self.presets,
                effects: Arc::new(HandlerRegistry::effects()),
                max_steps: 10_000,
            };
            let mut nodes = parse_document(text).children;
            let mut cx = HandlerContext::new(env, Arc::new(HandlerRegistry::with_defaults()));
            cx.resolve(&mut nodes);
            to_plain_text(&nodes)
        }
    }

    #[test]
    fn test_if_else_child_form() {
        let mut h = Harness::new(json!({"health": 3}));
        let text = ":::if[health > 5]\nhigh\n::set{key=won value=true}\n:::else\nlow\n:::";
        assert_eq!(h.render(text), "low");
        assert_eq!(h.state.get_value("won"), None);
    }

    #[test]
    fn test_if_else_sibling_chain() {
        let text = "::::if[gold > 10]\nrich\n::::\n::::else[gold > 0]\nfine\n::::\n::::else\nbroke\n::::";
        assert_eq!(Harness::new(json!({"gold": 20})).render(text), "rich");
        assert_eq!(Harness::new(json!({"gold": 5})).render(text), "fine");
        let mut h = Harness::new(json!({"gold": 0}));
        assert_eq!(h.render(text), "broke");
        assert!(h.state.errors().is_empty());
    }

    #[test]
    fn test_undefined_condition_is_false() {
        let mut h = Harness::new(json!({}));
        assert_eq!(h.render(":::if[visited_cellar]\nagain\n:::"), "");
        assert!(h.state.errors().is_empty());
    }

    #[test]
    fn test_orphan_else_is_an_error() {
        let mut h = Harness::new(json!({}));
        assert_eq!(h.render("before\n\n:::else\nnever\n:::"), "before");
        assert_eq!(h.state.errors().len(), 1);
    }

    #[test]
    fn test_for_over_array_and_count() {
        let mut h = Harness::new(json!({"party": ["Ada", "Bob"]}));
        assert_eq!(h.render(":::for[x in [1,2,3]]\nHi\n:::"), "HiHiHi");
        assert_eq!(h.render(":::for[x in []]\nHi\n:::"), "");
        assert_eq!(h.render(":::for[(name, i) in party]\n:show[i]=:show[name];\n:::"), "0=Ada;1=Bob;");
        assert_eq!(h.render(":::for[n in 3]\n:show[n]\n:::"), "012");
    }

    #[test]
    fn test_for_over_object_binds_keys() {
        let mut h = Harness::new(json!({"stats": {"atk": 3, "def": 1}}));
        assert_eq!(h.render(":::for[(v, k) in stats]\n:show[k]:show[v]\n:::"), "atk3def1");
    }

    #[test]
    fn test_for_with_bad_header() {
        let mut h = Harness::new(json!({}));
        assert_eq!(h.render(":::for[items]\nHi\n:::"), "");
        assert_eq!(h.render(":::for[x in missing]\nHi\n:::"), "");
        assert_eq!(h.state.errors().len(), 2);
    }

    #[test]
    fn test_switch() {
        let text = ":::switch[mood]\n::::case['happy']\nsmile\n::::\n::::case[2]\ntwo\n::::\n::::default\nshrug\n::::\n:::";
        assert_eq!(Harness::new(json!({"mood": "happy"})).render(text), "smile");
        assert_eq!(Harness::new(json!({"mood": "2"})).render(text), "two");
        assert_eq!(Harness::new(json!({"mood": "odd"})).render(text), "shrug");
    }

    #[test]
    fn test_show_range_and_expression() {
        let mut h = Harness::new(json!({"hp": {"min": 0, "max": 10, "value": 4}, "gold": 3}));
        assert_eq!(h.render("HP :show[hp], gold :show[gold * 2]"), "HP 4, gold 6");
    }

    #[test]
    fn test_effect_runs_once_and_registers() {
        let mut h = Harness::new(json!({"hp": 3}));
        h.render(":::effect{watch=hp}\n::increment{key=ticks}\n:::");
        assert_eq!(h.state.get_value("ticks"), Some(&json!(1)));
        assert_eq!(h.watchers.len(), 1);
    }

    #[test]
    fn test_effect_rejects_presentation() {
        let mut h = Harness::new(json!({}));
        h.render(":::effect\n::show[x]\n:::");
        assert_eq!(h.state.errors().len(), 1);
        assert!(h.watchers.is_empty());
    }

    #[test]
    fn test_loop_header_parsing() {
        assert_eq!(parse_loop_header("x in xs"), Some(("x", None, "xs")));
        assert_eq!(parse_loop_header("(it, i) in [1, 2]"), Some(("it", Some("i"), "[1, 2]")));
        assert_eq!(parse_loop_header("x in "), None);
        assert_eq!(parse_loop_header("1x in xs"), None);
    }
}
