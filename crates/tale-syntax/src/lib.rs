//! Passage syntax: Markdown with directives.
//!
//! Three directive flavors are recognized:
//!
//! - text directives inside prose: `:show[gold]`
//! - leaf directives on their own line: `::set{key=gold value=10}`
//! - container directives fenced by colon runs:
//!
//! ```text
//! :::if[gold > 5]
//! You feel rich.
//! :::
//! ```
//!
//! The pieces run in order: [`scan`] splits text into directive spans,
//! [`normalize`] removes indentation that would otherwise turn nested
//! directives into Markdown code blocks, and [`parse_document`] builds the
//! [`Node`] tree. Attribute values stay raw strings in the tree;
//! [`parse_typed_value`] coerces them when a handler asks.

mod attrs;
mod builder;
mod fence;
mod markdown;
mod node;
mod normalize;
mod scanner;
mod value;

pub use attrs::{attributes_to_syntax, parse_attributes};
pub use builder::{Document, parse_document};
pub use node::{DirectiveKind, DirectiveNode, Node};
pub use normalize::normalize;
pub use scanner::{DirectiveHeader, DirectiveToken, Scanner, TokenKind, parse_directive, scan};
pub use value::{parse_object_literal, parse_typed_value};
