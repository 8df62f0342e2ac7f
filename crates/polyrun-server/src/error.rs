//! Error types for the polyrun server.

use polyrun_types::ProtocolError;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Server configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::MissingField(_) => 400,
            ServerError::Config(_) | ServerError::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::MissingField(_) => "missing_field",
            ServerError::Config(_) => "config_error",
            ServerError::Internal(_) => "internal_error",
        }
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::MissingField { field } => ServerError::MissingField(field),
            ProtocolError::InvalidMessage { message } => ServerError::InvalidRequest(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_are_client_errors() {
        let err: ServerError = ProtocolError::missing_field("source_lang").into();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_type(), "missing_field");
        assert_eq!(err.to_string(), "Missing required field: source_lang");
    }

    #[test]
    fn test_invalid_message_is_invalid_request() {
        let err: ServerError = ProtocolError::invalid_message("bad action").into();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_type(), "invalid_request");
    }

    #[test]
    fn test_config_errors_are_server_errors() {
        let err = ServerError::config_error("bad bind address");
        assert_eq!(err.status_code(), 500);
    }
}
