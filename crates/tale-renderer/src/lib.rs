//! Directive resolution for tale passages.
//!
//! A passage goes through [`Pipeline::parse`] (normalizer plus AST builder)
//! and is then resolved by the dispatcher: every directive node is handed to
//! the [`DirectiveHandler`] registered for its name, which reads and writes
//! the [`StateManager`](tale_state::StateManager), rewrites the tree, or
//! turns the directive into a component element. The resolved tree feeds
//! the bridge ([`build_components`], [`to_plain_text`], [`to_html`]).
//!
//! [`Session`] ties the pieces together:
//!
//! ```
//! use serde_json::json;
//! use tale_renderer::{Session, to_plain_text};
//! use tale_state::StateManager;
//!
//! let state = StateManager::with_data(json!({"health": 3}).as_object().cloned().unwrap());
//! let mut session = Session::new(state);
//! let passage = session.render_passage(":::if[health > 5]\nhigh\n:::else\nlow\n:::");
//! assert_eq!(to_plain_text(&passage.nodes), "low");
//! ```

mod bridge;
mod context;
mod dispatch;
mod handlers;
mod pipeline;
mod presets;
mod registry;
mod runner;
mod schema;
mod session;
mod watch;

pub use bridge::{Component, build_components, passage_hooks, to_html, to_plain_text};
pub use context::{Env, HandlerContext};
pub use dispatch::{Flow, resolve_nodes};
pub use pipeline::Pipeline;
pub use presets::Presets;
pub use registry::{DirectiveHandler, Fallback, HandlerRegistry};
pub use runner::BlockRunner;
pub use schema::{AttrType, AttributeSchema, AttributeSpec, ExtractOptions, Extracted, extract_attributes};
pub use session::{RenderSettings, RenderedPassage, Session};
pub use watch::WatchRegistry;
