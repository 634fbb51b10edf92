//! Depth-first directive dispatch.

use tale_syntax::{DirectiveKind, DirectiveNode, Node};

use crate::context::HandlerContext;
use crate::registry::Fallback;

/// Where the dispatcher continues after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Resolve the children of the node now at the index, then advance.
    Descend,
    /// Advance past the node without visiting its children.
    Skip,
    /// Continue at this sibling index without descending. Returning the
    /// handler's own index after removing the node deletes it in place.
    ResumeAt(usize),
}

/// Resolve every directive in `nodes`, in document order.
///
/// Containers are fully resolved before their following siblings. Plain
/// elements are descended into; text is left alone.
pub fn resolve_nodes(cx: &mut HandlerContext<'_>, nodes: &mut Vec<Node>) {
    let mut index = 0;
    while index < nodes.len() {
        if !cx.step() {
            return;
        }
        let flow = match nodes[index] {
            Node::Directive(_) => dispatch(cx, nodes, index),
            Node::Element { .. } => Flow::Descend,
            Node::Text { .. } | Node::Html { .. } => Flow::Skip,
        };
        match flow {
            Flow::Descend => {
                if let Some(children) = nodes.get_mut(index).and_then(Node::children_mut) {
                    resolve_nodes(cx, children);
                }
                index += 1;
            }
            Flow::Skip => index += 1,
            Flow::ResumeAt(next) => index = next,
        }
    }
}

fn dispatch(cx: &mut HandlerContext<'_>, nodes: &mut Vec<Node>, index: usize) -> Flow {
    let Some(directive) = nodes[index].as_directive_mut() else {
        return Flow::Descend;
    };
    let name = directive.name.clone();

    if let Some(key) = take_once_key(directive) {
        if cx.state.is_once(&key) {
            tracing::debug!(%name, %key, "skipping directive that already ran");
            nodes.remove(index);
            return Flow::ResumeAt(index);
        }
        cx.state.mark_once(&key);
    }

    if let Some(handler) = cx.registry().get(&name) {
        return handler.handle(cx, nodes, index);
    }
    match cx.registry().fallback() {
        Fallback::PassThrough => pass_through(nodes, index),
        Fallback::Reject => {
            cx.add_error(format!("directive `{name}` is not allowed here"));
            nodes.remove(index);
            Flow::ResumeAt(index)
        }
    }
}

/// Strip the `once` attribute, returning its key.
///
/// A bare `once` keys the directive by its remaining source: name, label
/// and attributes, plus the text of a container without a label.
fn take_once_key(directive: &mut DirectiveNode) -> Option<String> {
    let explicit = directive.attributes.remove("once")?;
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return Some(explicit.to_owned());
    }
    let mut key = directive.to_syntax();
    if directive.label.is_none() {
        let text = directive.text_content();
        let text = text.trim();
        if !text.is_empty() {
            key.push(' ');
            key.push_str(text);
        }
    }
    Some(key)
}

/// Replace an unknown directive with its source text.
///
/// Container children stay in place between the opening and closing
/// markers and are still resolved.
fn pass_through(nodes: &mut Vec<Node>, index: usize) -> Flow {
    let node = nodes.remove(index);
    let Node::Directive(directive) = node else {
        nodes.insert(index, node);
        return Flow::Skip;
    };
    tracing::debug!(name = %directive.name, "no handler, passing directive through");
    let opening = directive.to_syntax();
    if directive.kind != DirectiveKind::Container {
        nodes.insert(index, Node::text(opening));
        return Flow::Skip;
    }
    let mut replacement = Vec::with_capacity(directive.children.len() + 2);
    replacement.push(Node::text(opening));
    replacement.extend(directive.children);
    replacement.push(Node::text(":::"));
    nodes.splice(index..index, replacement);
    Flow::ResumeAt(index + 1)
}
