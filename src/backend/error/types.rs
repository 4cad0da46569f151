/**
 * Backend Error Types
 *
 * `StoreError` is what the per-tenant chat and direct-message stores
 * return. `BackendError` is what handlers return; it knows its HTTP status
 * and the message a client is allowed to see.
 *
 * Infrastructure failures (database, decryption, serialization) are logged
 * with full detail by whoever catches them and rendered to clients as a
 * generic message.
 */
use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::tenancy::{TenantError, TenantErrorKind};
use crate::shared::SharedError;

/// Errors returned by tenant database stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("user {user_id} may not modify {entity} {id}")]
    Forbidden {
        entity: &'static str,
        id: Uuid,
        user_id: Uuid,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn forbidden(entity: &'static str, id: Uuid, user_id: Uuid) -> Self {
        Self::Forbidden { entity, id, user_id }
    }
}

/// Backend-specific error types
///
/// # Usage
///
/// ```rust
/// use xfhub::backend::error::BackendError;
/// use axum::http::StatusCode;
///
/// let err = BackendError::handler(StatusCode::BAD_REQUEST, "room_id is required");
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// Handler error (bad parameters, missing credentials)
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// Failure while assembling the server at startup
    #[error("Startup error: {message}")]
    StartupError { message: String },

    /// Tenant resolution failure
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Tenant database store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid client input
    #[error(transparent)]
    SharedError(#[from] SharedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BackendError {
    /// Create a new handler error with a status code
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    pub fn startup(message: impl Into<String>) -> Self {
        Self::StartupError {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `HandlerError` - Uses the status code from the error
    /// - `Tenant` - 404 unknown, 403 inactive, 500 otherwise
    /// - `Store` - 404 not found, 403 forbidden, 500 database
    /// - `SharedError` - 400 Bad Request
    /// - everything else - 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::HandlerError { status, .. } => *status,
            Self::StartupError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Tenant(err) => match err.kind() {
                TenantErrorKind::NotFound => StatusCode::NOT_FOUND,
                TenantErrorKind::Inactive => StatusCode::FORBIDDEN,
                TenantErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Store(err) => match err {
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                StoreError::Forbidden { .. } => StatusCode::FORBIDDEN,
                StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::SharedError(_) => StatusCode::BAD_REQUEST,
            Self::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the error was caused by the caller, not by the server
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Message safe to show a client
    pub fn message(&self) -> String {
        match self {
            Self::HandlerError { message, .. } => message.clone(),
            Self::Tenant(err) => match err.kind() {
                TenantErrorKind::NotFound => "tenant not found".to_string(),
                TenantErrorKind::Inactive => "tenant inactive".to_string(),
                TenantErrorKind::Infrastructure => "internal server error".to_string(),
            },
            Self::Store(err @ (StoreError::NotFound { .. } | StoreError::Forbidden { .. })) => err.to_string(),
            Self::SharedError(err) => err.to_string(),
            Self::StartupError { .. } | Self::Store(StoreError::Database(_)) | Self::SerializationError(_) => {
                "internal server error".to_string()
            }
        }
    }
}
