//! Event hooks (`onEnter`, `onMouseDown`, ...).
//!
//! A hook's body is not run during resolution. It is serialized into the
//! `block` prop and replayed by the session when the event fires.

use serde_json::Map;
use tale_syntax::Node;

use super::{serialize_block, take_directive};
use crate::context::HandlerContext;
use crate::dispatch::Flow;
use crate::registry::HandlerRegistry;

pub(crate) const HOOK_NAMES: [&str; 8] = [
    "onExit",
    "onEnter",
    "onFocus",
    "onBlur",
    "onMouseEnter",
    "onMouseExit",
    "onMouseDown",
    "onMouseUp",
];

pub(crate) fn is_hook_tag(tag: &str) -> bool {
    HOOK_NAMES.contains(&tag)
}

pub(super) fn register(registry: &mut HandlerRegistry) {
    for name in HOOK_NAMES {
        registry.register(name, hook);
    }
}

fn hook(cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
    let Some(directive) = take_directive(siblings, index) else {
        return Flow::Skip;
    };
    let mut props = Map::new();
    match serialize_block(&directive.children) {
        Ok(block) => {
            props.insert("block".to_owned(), block);
        }
        Err(err) => {
            cx.add_error(format!("{}: cannot store block: {err}", directive.name));
            return Flow::ResumeAt(index);
        }
    }
    siblings.insert(index, Node::Element {
        tag: directive.name,
        props,
        children: Vec::new(),
    });
    Flow::Skip
}
