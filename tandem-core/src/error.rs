//! Error types for tandem-core.

use thiserror::Error;

/// Errors raised while parsing a field path or writing through one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The textual path could not be parsed.
    #[error("invalid field path {input:?}: {reason}")]
    Parse { input: String, reason: &'static str },

    /// A segment addressed a value that cannot hold children.
    #[error("cannot address `{segment}` inside {kind} at {path:?}")]
    Mismatch {
        path: String,
        segment: String,
        kind: &'static str,
    },

    /// An array index pointed more than one slot past the end.
    #[error("index {index} out of bounds (len {len}) at {path:?}")]
    OutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
}

/// Unknown validation mode name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeError {
    #[error("unknown validation mode {0:?}; expected onSubmit, onChange, onBlur, onTouched or all")]
    Unknown(String),
}

/// Errors raised while loading declarative form configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON parse error, with serde_json's line/column context.
    #[error("failed to parse form options: {0}")]
    Json(#[from] serde_json::Error),
}
