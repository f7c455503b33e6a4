//! Error types for tandem-sync.

use thiserror::Error;

use tandem_core::PathError;

/// Errors surfaced by store and form adapters during a sync pass.
///
/// Diff kind mismatches and suppressed re-entrant notifications are not
/// errors and never show up here.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A field path could not be written.
    #[error("field path error: {0}")]
    Path(#[from] PathError),

    /// An adapter refused an operation.
    #[error("{target} adapter error: {message}")]
    Adapter {
        target: &'static str,
        message: String,
    },
}

impl SyncError {
    /// Convenience constructor for [`SyncError::Adapter`].
    pub fn adapter(target: &'static str, message: impl Into<String>) -> Self {
        SyncError::Adapter {
            target,
            message: message.into(),
        }
    }
}
