//! Error types for the idempotency layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorBody;

// == Config Error Enum ==
/// Raised while loading or validating configuration. Always fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A route rule is missing data or cannot be compiled
    #[error("Invalid route #{index}: {reason}")]
    InvalidRoute {
        index: usize,
        #[source]
        reason: RouteError,
    },

    /// Concurrent rejection status is not a valid HTTP status
    #[error("Invalid concurrent response status: {0}")]
    InvalidStatus(u16),

    /// Header name cannot be used in an HTTP message
    #[error("Invalid header name: {0}")]
    InvalidHeader(String),

    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config document is not valid JSON or has the wrong shape
    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

// == Route Error Enum ==
/// Why a single route rule was rejected.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("path must not be empty")]
    EmptyPath,

    #[error("path '{0}' must start with '/'")]
    RelativePath(String),

    #[error("http_method must not be empty")]
    EmptyMethod,

    /// Methods are compared exactly, so a lower-case rule would never match
    #[error("http_method '{0}' must be an upper-case token such as POST")]
    InvalidMethod(String),

    #[error("pattern cannot be compiled: {0}")]
    Pattern(#[from] regex::Error),
}

// == Storage Error Enum ==
/// Failure reported by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend cannot be reached (connection refused, dropped, timed out)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Backend answered with an error
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            StorageError::Unavailable(err.to_string())
        } else {
            StorageError::Backend(err.to_string())
        }
    }
}

// == Idempotency Error Enum ==
/// Unified error type for the idempotency layer.
#[derive(Error, Debug)]
pub enum IdempotencyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Cached payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The wrapped handler's response body failed while streaming
    #[error("Response body error: {0}")]
    Body(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for IdempotencyError {
    fn into_response(self) -> Response {
        let status = match &self {
            IdempotencyError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorBody::internal(self.to_string()))).into_response()
    }
}

// == Result Type Aliases ==
/// Convenience Result type for the idempotency layer.
pub type Result<T> = std::result::Result<T, IdempotencyError>;

/// Result type returned by storage backends.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_error_maps_to_500() {
        let response = IdempotencyError::Body("stream reset".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_storage_error_maps_to_503() {
        let err: IdempotencyError = StorageError::Unavailable("down".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidRoute {
            index: 2,
            reason: RouteError::EmptyPath,
        };
        assert_eq!(err.to_string(), "Invalid route #2: path must not be empty");
    }
}
