//! Attribute schemas for directive handlers.
//!
//! A handler declares the attributes it understands with an
//! [`AttributeSchema`] and calls [`extract_attributes`] to coerce the raw
//! strings from the tree. A directive that fails its schema is removed from
//! the tree and the failure is recorded in the session error channel.

use serde_json::{Map, Value};
use tale_syntax::Node;

use crate::context::HandlerContext;

/// Expected type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl AttrType {
    fn describe(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Number => "a number",
            Self::Boolean => "a boolean",
            Self::Array => "an array",
            Self::Object => "an object",
            Self::Any => "a value",
        }
    }
}

/// One attribute in a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub ty: AttrType,
    pub required: bool,
    pub default: Option<Value>,
}

/// Attributes a handler accepts, in declaration order.
///
/// ```
/// use serde_json::json;
/// use tale_renderer::{AttrType, AttributeSchema};
///
/// let schema = AttributeSchema::new()
///     .required("value", AttrType::Any)
///     .with_default("amount", AttrType::Number, json!(1));
/// assert!(schema.contains("amount"));
/// assert!(!schema.contains("key"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSchema {
    specs: Vec<(&'static str, AttributeSpec)>,
}

impl AttributeSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required attribute.
    #[must_use]
    pub fn required(self, name: &'static str, ty: AttrType) -> Self {
        self.with_spec(name, AttributeSpec {
            ty,
            required: true,
            default: None,
        })
    }

    /// Add an optional attribute with no default.
    #[must_use]
    pub fn optional(self, name: &'static str, ty: AttrType) -> Self {
        self.with_spec(name, AttributeSpec {
            ty,
            required: false,
            default: None,
        })
    }

    /// Add an optional attribute filled with `default` when absent.
    #[must_use]
    pub fn with_default(self, name: &'static str, ty: AttrType, default: Value) -> Self {
        self.with_spec(name, AttributeSpec {
            ty,
            required: false,
            default: Some(default),
        })
    }

    fn with_spec(mut self, name: &'static str, spec: AttributeSpec) -> Self {
        self.specs.retain(|(existing, _)| *existing != name);
        self.specs.push((name, spec));
        self
    }

    /// Whether `name` is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.specs.iter().any(|(existing, _)| *existing == name)
    }

    /// Declared attributes in order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &AttributeSpec)> {
        self.specs.iter().map(|(name, spec)| (*name, spec))
    }
}

/// How [`extract_attributes`] derives the directive's key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Attribute naming the key. The label and then the children's text are
    /// used when it is absent.
    pub key_attr: Option<&'static str>,
    /// Fail the schema when no key can be found.
    pub require_key: bool,
}

impl ExtractOptions {
    /// Require a key read from `attr`, the label or the text content.
    #[must_use]
    pub fn keyed(attr: &'static str) -> Self {
        Self {
            key_attr: Some(attr),
            require_key: true,
        }
    }
}

/// Coerced attribute values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub key: Option<String>,
    pub values: Map<String, Value>,
}

impl Extracted {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(Value::as_f64)
    }

    /// Boolean attribute, false when absent.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.values.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Remove and return a value.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }
}

/// Apply `schema` to the directive at `siblings[index]`.
///
/// On failure the directive is removed, one error listing every problem is
/// recorded and `None` is returned; the caller should answer
/// `Flow::ResumeAt(index)`.
pub fn extract_attributes(
    cx: &mut HandlerContext<'_>,
    siblings: &mut Vec<Node>,
    index: usize,
    schema: &AttributeSchema,
    options: ExtractOptions,
) -> Option<Extracted> {
    let directive = siblings.get(index)?.as_directive()?;
    let mut problems = Vec::new();
    let mut values = Map::new();

    for (name, spec) in schema.iter() {
        match directive.attributes.get(name) {
            Some(raw) => match coerce(cx, raw, spec.ty) {
                Some(value) => {
                    values.insert(name.to_owned(), value);
                }
                None => problems.push(format!("attribute `{name}` must be {}", spec.ty.describe())),
            },
            None if spec.required => problems.push(format!("missing required attribute `{name}`")),
            None => {
                if let Some(default) = &spec.default {
                    values.insert(name.to_owned(), default.clone());
                }
            }
        }
    }

    let key = options.key_attr.and_then(|attr| {
        directive
            .attr(attr)
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .or_else(|| directive.label_text())
            .map(str::to_owned)
            .or_else(|| {
                let text = directive.text_content();
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_owned())
            })
    });
    if options.require_key && key.is_none() {
        let attr = options.key_attr.unwrap_or("key");
        problems.push(format!("missing `{attr}` (attribute, label or text)"));
    }

    if problems.is_empty() {
        return Some(Extracted { key, values });
    }
    let message = format!("{}: {}", directive.name, problems.join("; "));
    cx.add_error(message);
    siblings.remove(index);
    None
}

fn coerce(cx: &HandlerContext<'_>, raw: &str, ty: AttrType) -> Option<Value> {
    match ty {
        AttrType::String => Some(Value::String(raw.to_owned())),
        AttrType::Any => Some(cx.typed_value(raw)),
        AttrType::Boolean if raw.trim().is_empty() => Some(Value::Bool(true)),
        AttrType::Boolean => Some(cx.typed_value(raw)).filter(Value::is_boolean),
        AttrType::Number => Some(cx.typed_value(raw)).filter(Value::is_number),
        AttrType::Object => Some(cx.typed_value(raw)).filter(Value::is_object),
        AttrType::Array => match cx.typed_value(raw) {
            array @ Value::Array(_) => Some(array),
            _ if raw.contains(',') => Some(Value::Array(
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| cx.typed_value(item))
                    .collect(),
            )),
            _ if raw.trim().is_empty() => Some(Value::Array(Vec::new())),
            single => Some(Value::Array(vec![single])),
        },
    }
}
