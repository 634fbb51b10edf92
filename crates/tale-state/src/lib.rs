//! Game state for tale passages.
//!
//! [`StateManager`] holds a JSON tree addressed by dot-delimited key paths
//! (`player.inventory.weapon`). On top of plain reads and writes it tracks:
//!
//! - locks, which make a path and everything below it read-only;
//! - once-markers, used by `once`-guarded directives;
//! - bounded numbers ([`RangeValue`]);
//! - isolated [`StateScope`]s whose writes are applied atomically;
//! - a queue of [`ChangeEvent`]s consumed by watchers.
//!
//! The whole session round-trips through [`SessionSnapshot`].

mod error;
mod manager;
mod path;
mod range;
mod scope;
mod snapshot;

pub use error::StateError;
pub use manager::{ChangeEvent, SetOptions, StateManager};
pub use path::KeyPath;
pub use range::RangeValue;
pub use scope::{Change, ChangeOp, StateScope};
pub use snapshot::SessionSnapshot;
