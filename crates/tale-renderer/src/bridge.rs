//! Renderer bridge: resolved trees to component instances, plain text and
//! HTML.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tale_expr::to_display_string;
use tale_syntax::Node;

use crate::handlers::{is_component_tag, is_hook_tag};

/// One component instance in a resolved passage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    /// Depth-first position among all components of the passage.
    pub id: usize,
    pub tag: String,
    pub props: Map<String, Value>,
    /// Literal text of the component's subtree.
    pub text: String,
    /// Event name to stored block. Trigger actions appear as `onClick`.
    pub hooks: BTreeMap<String, Vec<Node>>,
    pub children: Vec<Component>,
}

/// Numbered component instances of a resolved tree.
///
/// Hook elements attach to their nearest enclosing component; hooks outside
/// any component are collected by [`passage_hooks`].
#[must_use]
pub fn build_components(nodes: &[Node]) -> Vec<Component> {
    let mut components = Vec::new();
    let mut stray_hooks = BTreeMap::new();
    let mut next_id = 0;
    collect(nodes, &mut next_id, &mut components, &mut stray_hooks);
    components
}

/// Hooks that are not inside any component, keyed by event name.
#[must_use]
pub fn passage_hooks(nodes: &[Node]) -> BTreeMap<String, Vec<Node>> {
    let mut components = Vec::new();
    let mut hooks = BTreeMap::new();
    let mut next_id = 0;
    collect(nodes, &mut next_id, &mut components, &mut hooks);
    hooks
}

fn collect(
    nodes: &[Node],
    next_id: &mut usize,
    out: &mut Vec<Component>,
    hooks: &mut BTreeMap<String, Vec<Node>>,
) {
    for node in nodes {
        let Node::Element {
            tag,
            props,
            children,
        } = node
        else {
            continue;
        };
        if is_hook_tag(tag) {
            hooks
                .entry(tag.clone())
                .or_default()
                .extend(stored_block(props, "block"));
            continue;
        }
        if !is_component_tag(tag) {
            collect(children, next_id, out, hooks);
            continue;
        }

        let id = *next_id;
        *next_id += 1;
        let mut props = props.clone();
        let mut component_hooks = BTreeMap::new();
        if let Some(actions) = props.remove("actions") {
            let actions = serde_json::from_value::<Vec<Node>>(actions).unwrap_or_default();
            component_hooks.insert("onClick".to_owned(), actions);
        }
        let mut component = Component {
            id,
            tag: tag.clone(),
            props,
            text: node.text_content(),
            hooks: component_hooks,
            children: Vec::new(),
        };
        collect(children, next_id, &mut component.children, &mut component.hooks);
        out.push(component);
    }
}

fn stored_block(props: &Map<String, Value>, name: &str) -> Vec<Node> {
    props
        .get(name)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "ul", "ol", "li", "dl", "dt",
    "dd", "table", "thead", "tbody", "tr", "div", "hr", "deck", "slide", "layer",
];

/// Plain text of a resolved tree: blocks separated by blank lines, inline
/// content concatenated, surrounding whitespace trimmed.
///
/// ```
/// use tale_renderer::to_plain_text;
/// use tale_syntax::Node;
///
/// let nodes = vec![
///     Node::element("p", vec![Node::text("one")]),
///     Node::text("Hi"),
///     Node::text("Hi"),
/// ];
/// assert_eq!(to_plain_text(&nodes), "one\n\nHiHi");
/// ```
#[must_use]
pub fn to_plain_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_text(nodes, &mut out);
    collapse_blank_lines(&out).trim().to_owned()
}

fn write_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text { value } => out.push_str(value),
            Node::Html { .. } => {}
            Node::Directive(directive) => out.push_str(&directive.to_syntax()),
            Node::Element { tag, props, children } => {
                if is_hook_tag(tag) {
                    continue;
                }
                if tag == "br" {
                    out.push('\n');
                    continue;
                }
                let block = BLOCK_TAGS.contains(&tag.as_str());
                if block {
                    out.push_str("\n\n");
                }
                if children.is_empty() {
                    if let Some(label) = props.get("label").and_then(Value::as_str) {
                        out.push_str(label);
                    }
                } else {
                    write_text(children, out);
                }
                if block {
                    out.push_str("\n\n");
                }
            }
        }
    }
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out
}

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input"];

/// HTML for a resolved tree.
///
/// Prose elements keep their tag. Components become `<tale-*>` custom
/// elements with their props as `data-*` attributes. Hooks are omitted.
///
/// ```
/// use serde_json::{Map, json};
/// use tale_renderer::to_html;
/// use tale_syntax::Node;
///
/// let mut props = Map::new();
/// props.insert("type".to_owned(), json!("circle"));
/// let nodes = vec![
///     Node::element("p", vec![Node::text("1 < 2")]),
///     Node::Element { tag: "shape".to_owned(), props, children: Vec::new() },
/// ];
/// assert_eq!(
///     to_html(&nodes),
///     "<p>1 &lt; 2</p><tale-shape data-type=\"circle\"></tale-shape>"
/// );
/// ```
#[must_use]
pub fn to_html(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_html(nodes, &mut out);
    out
}

fn write_html(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text { value } => out.push_str(&escape(value)),
            Node::Html { value } => out.push_str(value),
            Node::Directive(directive) => out.push_str(&escape(&directive.to_syntax())),
            Node::Element { tag, props, children } => {
                if is_hook_tag(tag) {
                    continue;
                }
                if is_component_tag(tag) {
                    write_component(tag, props, children, out);
                } else {
                    write_element(tag, props, children, out);
                }
            }
        }
    }
}

fn write_component(tag: &str, props: &Map<String, Value>, children: &[Node], out: &mut String) {
    let name = format!("tale-{}", kebab_case(tag));
    out.push('<');
    out.push_str(&name);
    for (key, value) in props {
        if key == "actions" {
            continue;
        }
        let text = match value {
            Value::String(s) => s.clone(),
            other if other.is_object() || other.is_array() => other.to_string(),
            other => to_display_string(other),
        };
        out.push_str(&format!(" data-{}=\"{}\"", kebab_case(key), escape(&text)));
    }
    out.push('>');
    write_html(children, out);
    out.push_str(&format!("</{name}>"));
}

fn write_element(tag: &str, props: &Map<String, Value>, children: &[Node], out: &mut String) {
    if tag == "pre" {
        let class = props
            .get("lang")
            .and_then(Value::as_str)
            .map(|lang| format!(" class=\"language-{}\"", escape(lang)))
            .unwrap_or_default();
        out.push_str(&format!("<pre><code{class}>"));
        write_html(children, out);
        out.push_str("</code></pre>");
        return;
    }
    out.push('<');
    out.push_str(tag);
    for (key, value) in props {
        match value {
            Value::Bool(true) => out.push_str(&format!(" {key}")),
            Value::Bool(false) | Value::Null => {}
            other => {
                out.push_str(&format!(" {key}=\"{}\"", escape(&to_display_string(other))));
            }
        }
    }
    out.push('>');
    if VOID_TAGS.contains(&tag) {
        return;
    }
    write_html(children, out);
    out.push_str(&format!("</{tag}>"));
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
