//! State error types.

/// Error from a state operation.
///
/// The store is left untouched whenever an operation returns an error.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Key path is empty or contains an empty or malformed segment.
    #[error("invalid key path `{0}`")]
    InvalidPath(String),
    /// An intermediate segment holds a scalar, so nothing can be written below it.
    #[error("cannot write `{path}`: `{parent}` is not an object or array")]
    NotAContainer {
        /// Full path being written.
        path: String,
        /// Prefix that holds the scalar.
        parent: String,
    },
    /// Array index past the end (writing at exactly the length appends).
    #[error("index {index} is out of bounds in `{path}`")]
    IndexOutOfBounds {
        /// Full path being written.
        path: String,
        /// Offending index.
        index: usize,
    },
    /// Range bounds are reversed or not finite.
    #[error("invalid range for `{path}`: min {min} must not exceed max {max}")]
    InvalidRange {
        /// Range key path.
        path: String,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// No checkpoint with that name.
    #[error("checkpoint `{0}` not found")]
    UnknownCheckpoint(String),
    /// JSON round-trip failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
