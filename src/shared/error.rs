//! Shared Error Types
//!
//! Errors that describe bad input rather than infrastructure failures.
//! Inbound WebSocket frames that fail to decode surface as `SharedError`;
//! the session logs them and keeps running.
//!
//! # Usage
//!
//! ```rust
//! use xfhub::shared::error::SharedError;
//!
//! let error = SharedError::validation("to", "cannot send a direct message to yourself");
//! ```
use thiserror::Error;

/// Errors caused by malformed or invalid client input
#[derive(Debug, Error, Clone)]
pub enum SharedError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}
