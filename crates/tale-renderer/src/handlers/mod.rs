//! Built-in directive handlers.

mod components;
mod control;
mod hooks;
mod state;

use tale_syntax::{DirectiveNode, Node};

use crate::registry::HandlerRegistry;

pub(crate) use components::is_component_tag;
pub(crate) use hooks::is_hook_tag;

/// Register every built-in handler.
pub(crate) fn register_all(registry: &mut HandlerRegistry) {
    register_effect_subset(registry);
    registry
        .register("show", control::show)
        .register("effect", control::effect)
        .register("preset", control::preset);
    components::register(registry);
    hooks::register(registry);
}

/// State and control-flow handlers allowed inside `effect` bodies.
pub(crate) fn register_effect_subset(registry: &mut HandlerRegistry) {
    registry
        .register("set", state::set)
        .register("unset", state::unset)
        .register("increment", state::increment)
        .register("push", state::push)
        .register("createRange", state::create_range)
        .register("array", state::array)
        .register("if", control::if_directive)
        .register("else", control::orphan)
        .register("for", control::for_each)
        .register("switch", control::switch)
        .register("case", control::orphan)
        .register("default", control::orphan);
}

/// Remove the directive at `index` and return it.
fn take_directive(siblings: &mut Vec<Node>, index: usize) -> Option<DirectiveNode> {
    if !siblings.get(index).is_some_and(|node| node.as_directive().is_some()) {
        return None;
    }
    match siblings.remove(index) {
        Node::Directive(directive) => Some(directive),
        _ => None,
    }
}

/// Inline content of a body that is a single paragraph.
fn unwrap_paragraph(mut body: Vec<Node>) -> Vec<Node> {
    let lone_paragraph = body.len() == 1 && matches!(&body[0], Node::Element { tag, .. } if tag == "p");
    if !lone_paragraph {
        return body;
    }
    match body.pop() {
        Some(Node::Element { children, .. }) => children,
        Some(other) => vec![other],
        None => Vec::new(),
    }
}

/// Serialize a block for later replay.
fn serialize_block(block: &[Node]) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unwrap_paragraph() {
        let body = vec![Node::element("p", vec![Node::text("low")])];
        assert_eq!(unwrap_paragraph(body), vec![Node::text("low")]);

        let body = vec![
            Node::element("p", vec![Node::text("a")]),
            Node::element("p", vec![Node::text("b")]),
        ];
        assert_eq!(unwrap_paragraph(body.clone()), body);
    }
}
