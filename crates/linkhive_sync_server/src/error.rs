//! Error types for the event relay.

use thiserror::Error;

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors that can occur in the event relay.
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    /// The backing store could not produce a fingerprint.
    #[error("fingerprint source error: {0}")]
    Source(String),

    /// The stream session has been closed.
    #[error("session closed")]
    SessionClosed,
}

impl RelayError {
    /// Creates a source error from any display value.
    pub fn source(message: impl std::fmt::Display) -> Self {
        Self::Source(message.to_string())
    }
}
