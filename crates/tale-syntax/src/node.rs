//! Document tree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attrs::attributes_to_syntax;

/// A node in a parsed passage.
///
/// Serialized with a `type` tag so resolved sub-trees can be stored as
/// plain JSON (for `trigger` actions, hooks and watchers) and replayed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    /// Literal text.
    Text {
        /// The text.
        value: String,
    },
    /// Raw HTML passed through from Markdown.
    Html {
        /// The markup.
        value: String,
    },
    /// Prose element (`p`, `em`, `h2`, ...) or a component instance.
    Element {
        /// Element or component tag.
        tag: String,
        /// Typed properties.
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        props: Map<String, Value>,
        /// Child nodes.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<Node>,
    },
    /// Unresolved directive.
    Directive(DirectiveNode),
}

impl Node {
    /// Text node.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    /// Element without props.
    #[must_use]
    pub fn element(tag: impl Into<String>, children: Vec<Node>) -> Self {
        Self::Element {
            tag: tag.into(),
            props: Map::new(),
            children,
        }
    }

    /// The directive, if this node is one.
    #[must_use]
    pub fn as_directive(&self) -> Option<&DirectiveNode> {
        match self {
            Self::Directive(directive) => Some(directive),
            _ => None,
        }
    }

    /// Mutable access to the directive, if this node is one.
    pub fn as_directive_mut(&mut self) -> Option<&mut DirectiveNode> {
        match self {
            Self::Directive(directive) => Some(directive),
            _ => None,
        }
    }

    /// Whether this is a directive named `name`.
    #[must_use]
    pub fn is_directive_named(&self, name: &str) -> bool {
        self.as_directive().is_some_and(|d| d.name == name)
    }

    /// Whether this is a text node containing only whitespace.
    #[must_use]
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Self::Text { value } if value.trim().is_empty())
    }

    /// Child nodes of elements and directives.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        match self {
            Self::Element { children, .. } => children,
            Self::Directive(directive) => &directive.children,
            Self::Text { .. } | Self::Html { .. } => &[],
        }
    }

    /// Mutable child list of elements and directives.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Self::Element { children, .. } => Some(children),
            Self::Directive(directive) => Some(&mut directive.children),
            Self::Text { .. } | Self::Html { .. } => None,
        }
    }

    /// Concatenated literal text of this node and its descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Self::Text { value } => out.push_str(value),
            Self::Html { .. } => {}
            Self::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
            Self::Directive(directive) => {
                for child in &directive.children {
                    child.collect_text(out);
                }
            }
        }
    }
}

/// Directive flavor, decided by the opening colon run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DirectiveKind {
    /// `:name` inside prose.
    Text,
    /// `::name` on its own line.
    Leaf,
    /// `:::name` ... `:::`.
    Container,
}

/// A parsed directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveNode {
    /// Flavor.
    pub kind: DirectiveKind,
    /// Directive name.
    pub name: String,
    /// Raw attribute values, keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// Raw `[label]` text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Body of a container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl DirectiveNode {
    /// Create a directive with no attributes, label or children.
    #[must_use]
    pub fn new(kind: DirectiveKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            attributes: BTreeMap::new(),
            label: None,
            children: Vec::new(),
        }
    }

    /// Set the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a raw attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Raw attribute value.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Label, with empty labels treated as absent.
    #[must_use]
    pub fn label_text(&self) -> Option<&str> {
        self.label.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }

    /// Concatenated literal text of the children.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.children.iter().map(Node::text_content).collect()
    }

    /// Whether this directive has leaf or text form.
    #[must_use]
    pub fn is_inline_form(&self) -> bool {
        matches!(self.kind, DirectiveKind::Leaf | DirectiveKind::Text)
    }

    /// Reconstruct the opening marker: colons, name, `[label]` and `{attrs}`.
    ///
    /// Used to pass unknown directives through as text.
    ///
    /// ```
    /// use tale_syntax::{DirectiveKind, DirectiveNode};
    ///
    /// let node = DirectiveNode::new(DirectiveKind::Text, "kbd")
    ///     .with_label("Ctrl+C")
    ///     .with_attr("title", "copy");
    /// assert_eq!(node.to_syntax(), r#":kbd[Ctrl+C]{title="copy"}"#);
    /// ```
    #[must_use]
    pub fn to_syntax(&self) -> String {
        let colons = match self.kind {
            DirectiveKind::Text => ":",
            DirectiveKind::Leaf => "::",
            DirectiveKind::Container => ":::",
        };
        let mut out = format!("{colons}{}", self.name);
        if let Some(label) = &self.label {
            out.push('[');
            out.push_str(label);
            out.push(']');
        }
        if !self.attributes.is_empty() {
            out.push('{');
            out.push_str(&attributes_to_syntax(&self.attributes));
            out.push('}');
        }
        out
    }
}
