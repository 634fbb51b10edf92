//! Component directives.
//!
//! Each component becomes an `Element` named after the directive, with its
//! attributes coerced into typed props. `trigger` and `button` keep their
//! children unexecuted as the serialized `actions` block.

use serde_json::Value;
use tale_syntax::Node;

use super::{serialize_block, take_directive};
use crate::context::HandlerContext;
use crate::dispatch::Flow;
use crate::presets::apply_preset;
use crate::registry::{DirectiveHandler, HandlerRegistry};
use crate::schema::{AttrType, AttributeSchema, ExtractOptions, extract_attributes};

use crate::schema::AttrType::{Any, Boolean, Number, String as Str};

/// Declared attribute: name, type, required.
type Attr = (&'static str, AttrType, bool);

struct ComponentSpec {
    tag: &'static str,
    attrs: &'static [Attr],
    /// Prop that receives the label; without one the label becomes text.
    label_prop: Option<&'static str>,
    keep_actions: bool,
}

const POSITION: [Attr; 4] = [
    ("x", Number, false),
    ("y", Number, false),
    ("width", Number, false),
    ("height", Number, false),
];

const fn component(tag: &'static str, attrs: &'static [Attr]) -> ComponentSpec {
    ComponentSpec {
        tag,
        attrs,
        label_prop: None,
        keep_actions: false,
    }
}

const fn labeled(tag: &'static str, attrs: &'static [Attr], prop: &'static str) -> ComponentSpec {
    ComponentSpec {
        tag,
        attrs,
        label_prop: Some(prop),
        keep_actions: false,
    }
}

const fn action(tag: &'static str) -> ComponentSpec {
    ComponentSpec {
        tag,
        attrs: &[("disabled", Boolean, false)],
        label_prop: Some("label"),
        keep_actions: true,
    }
}

static COMPONENTS: &[ComponentSpec] = &[
    component("deck", &[("size", Str, false), ("transition", Str, false)]),
    component("slide", &[("transition", Str, false), ("duration", Number, false)]),
    component("reveal", &[("at", Number, false), ("exitAt", Number, false)]),
    component("appear", &[("at", Number, false), ("exitAt", Number, false)]),
    component("layer", &POSITION),
    component("text", &POSITION),
    component(
        "shape",
        &[
            ("type", Str, true),
            ("x", Number, false),
            ("y", Number, false),
            ("width", Number, false),
            ("height", Number, false),
        ],
    ),
    component("embed", &[("src", Str, true)]),
    labeled("image", &[("src", Str, true)], "alt"),
    component("wrapper", &[("as", Str, false)]),
    action("trigger"),
    action("button"),
    labeled("input", &[("key", Str, true), ("placeholder", Str, false)], "label"),
    labeled("checkbox", &[("key", Str, true)], "label"),
    labeled("radio", &[("key", Str, true), ("value", Any, true)], "label"),
    labeled("textarea", &[("key", Str, true), ("placeholder", Str, false)], "label"),
    labeled("select", &[("key", Str, true)], "label"),
    labeled("option", &[("value", Any, true)], "label"),
    labeled("translate", &[("lang", Str, false)], "key"),
    component("lang", &[("code", Str, true)]),
    labeled("setLanguageLabel", &[("lang", Str, true)], "label"),
    component("translations", &[("lang", Str, true)]),
    component(
        "sound",
        &[("src", Str, true), ("volume", Number, false), ("loop", Boolean, false)],
    ),
    component(
        "bgm",
        &[("src", Str, true), ("volume", Number, false), ("loop", Boolean, false)],
    ),
    component("volume", &[("channel", Str, false), ("value", Number, true)]),
    component("preloadImage", &[("src", Str, true)]),
];

/// Whether elements with `tag` are component instances.
pub(crate) fn is_component_tag(tag: &str) -> bool {
    COMPONENTS.iter().any(|spec| spec.tag == tag)
}

pub(super) fn register(registry: &mut HandlerRegistry) {
    for spec in COMPONENTS {
        registry.register(spec.tag, ComponentHandler(spec));
    }
}

struct ComponentHandler(&'static ComponentSpec);

impl ComponentSpec {
    fn schema(&self) -> AttributeSchema {
        self.attrs
            .iter()
            .fold(AttributeSchema::new(), |schema, &(name, ty, required)| {
                if required {
                    schema.required(name, ty)
                } else {
                    schema.optional(name, ty)
                }
            })
    }
}

impl DirectiveHandler for ComponentHandler {
    fn handle(&self, cx: &mut HandlerContext<'_>, siblings: &mut Vec<Node>, index: usize) -> Flow {
        let spec = self.0;
        if let Some(directive) = siblings[index].as_directive_mut()
            && let Err(name) = apply_preset(cx.presets, directive)
        {
            cx.add_error(format!("{}: unknown preset `{name}`", spec.tag));
        }

        let schema = spec.schema();
        let Some(extracted) = extract_attributes(cx, siblings, index, &schema, ExtractOptions::default())
        else {
            return Flow::ResumeAt(index);
        };
        let Some(directive) = take_directive(siblings, index) else {
            return Flow::Skip;
        };

        let mut props = extracted.values;
        for (name, raw) in &directive.attributes {
            if !schema.contains(name) {
                props.insert(name.clone(), cx.typed_value(raw));
            }
        }
        let mut children = directive.children;
        if let Some(label) = directive.label.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            match spec.label_prop {
                Some(prop) => {
                    props.insert(prop.to_owned(), Value::String(label.to_owned()));
                }
                None => children.insert(0, Node::text(label)),
            }
        }

        if spec.keep_actions {
            match serialize_block(&children) {
                Ok(actions) => {
                    props.insert("actions".to_owned(), actions);
                }
                Err(err) => cx.add_error(format!("{}: cannot store actions: {err}", spec.tag)),
            }
            siblings.insert(index, Node::Element {
                tag: spec.tag.to_owned(),
                props,
                children: Vec::new(),
            });
            return Flow::Skip;
        }

        siblings.insert(index, Node::Element {
            tag: spec.tag.to_owned(),
            props,
            children,
        });
        Flow::Descend
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::Env;
    use crate::presets::Presets;
    use crate::watch::WatchRegistry;
    use pretty_assertions::assert_eq;
    use serde_json::json;
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
        cx.resolve(&mut nodes);
        nodes
    }

    #[test]
    fn test_props_are_typed() {
        let mut state = StateManager::new();
        let nodes = run("::shape{type=circle x=10 y=\"5 * 2\" fill=red}", &mut state);
        assert_eq!(
            nodes,
            vec![Node::Element {
                tag: "shape".to_owned(),
                props: json!({"type": "circle", "x": 10, "y": 10, "fill": "red"})
                    .as_object()
                    .cloned()
                    .unwrap(),
                children: Vec::new(),
            }]
        );
    }

    #[test]
    fn test_missing_required_prop_removes_component() {
        let mut state = StateManager::new();
        let nodes = run("::image[a cat]", &mut state);
        assert!(nodes.is_empty());
        assert_eq!(state.errors(), ["image: missing required attribute `src`"]);
    }

    #[test]
    fn test_children_are_resolved() {
        let mut state = StateManager::new();
        let nodes = run(":::slide\n::set{key=seen value=1}\nHello\n:::", &mut state);
        let Node::Element { tag, children, .. } = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(tag, "slide");
        assert_eq!(children.len(), 1);
        assert_eq!(state.get_value("seen"), Some(&json!(1)));
    }

    #[test]
    fn test_button_keeps_actions_unexecuted() {
        let mut state = StateManager::new();
        let nodes = run(":::button[Open]\n::set{key=open value=true}\n:::", &mut state);
        assert_eq!(state.get_value("open"), None);
        let Node::Element { props, children, .. } = &nodes[0] else {
            panic!("expected element");
        };
        assert!(children.is_empty());
        assert_eq!(props["label"], json!("Open"));
        let actions: Vec<Node> = serde_json::from_value(props["actions"].clone()).unwrap();
        assert!(actions[0].is_directive_named("set"));
    }

    #[test]
    fn test_preset_fills_missing_attributes() {
        let mut state = StateManager::new();
        let nodes = run(
            "::preset[big]{width=100 height=50}\n::layer{preset=big height=10}",
            &mut state,
        );
        let Node::Element { props, .. } = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(props["width"], json!(100));
        assert_eq!(props["height"], json!(10));
        assert!(!props.contains_key("preset"));
        assert!(state.errors().is_empty());
    }
}
