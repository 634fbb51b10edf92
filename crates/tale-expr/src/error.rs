//! Expression error types.

/// Error produced while compiling or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    /// The source contained no tokens.
    #[error("empty expression")]
    Empty,
    /// A character that cannot start any token.
    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedChar {
        /// Offending character.
        ch: char,
        /// Byte offset in the source.
        offset: usize,
    },
    /// A string literal without its closing quote.
    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),
    /// A numeric literal that could not be parsed.
    #[error("invalid number literal `{0}`")]
    InvalidNumber(String),
    /// The parser found a token it did not expect.
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken {
        /// Description of the token found.
        found: String,
        /// Description of what the parser wanted.
        expected: String,
    },
    /// Identifier not defined in the evaluation scope.
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    /// Call to a function outside the builtin set.
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    /// Arithmetic produced NaN or infinity.
    #[error("`{0}` did not produce a finite number")]
    NonFinite(String),
}
