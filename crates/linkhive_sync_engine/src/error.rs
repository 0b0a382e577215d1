//! Error types for the sync engine.

use thiserror::Error;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in the sync engine.
///
/// `Clone` so the single-flight coalescer can fan one failure out to
/// every caller that joined the shared operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The remote rejected the caller's credentials. The engine clears
    /// local state and surfaces a sign-out.
    #[error("unauthorized")]
    Unauthorized,

    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server returned a payload that could not be parsed or
    /// failed validation.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The server rejected the request.
    #[error("server error: {0}")]
    Server(String),

    /// Local persisted state could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// The operation was cancelled by a deliberate stop.
    #[error("cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Server(_) => true,
            _ => false,
        }
    }

    /// Returns true if this error means the credentials were rejected.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SyncError::Unauthorized)
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Malformed(err.to_string())
    }
}
