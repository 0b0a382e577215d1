//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding protocol payloads.
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    /// An event payload could not be parsed or failed validation.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// A message body could not be parsed or failed validation.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

impl ProtocolError {
    /// Creates a malformed-event error from any display value.
    pub fn event(message: impl std::fmt::Display) -> Self {
        Self::MalformedEvent(message.to_string())
    }

    /// Creates a malformed-message error from any display value.
    pub fn message(message: impl std::fmt::Display) -> Self {
        Self::MalformedMessage(message.to_string())
    }
}
