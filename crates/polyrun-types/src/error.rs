//! Error types for protocol decoding and validation.

use thiserror::Error;

/// Errors raised while decoding or validating protocol payloads.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// A required field was missing or empty.
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// A message could not be decoded.
    #[error("Invalid message: {message}")]
    InvalidMessage { message: String },
}

impl ProtocolError {
    /// Create a new missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a new invalid message error.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }
}
