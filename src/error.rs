use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Failure to resolve a client address.
///
/// Only a malformed connection peer address is fatal. Anything wrong inside
/// forwarding headers is skipped during resolution instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("malformed peer address {addr:?}: {reason}")]
    MalformedPeerAddr { addr: String, reason: &'static str },
}

impl ResolveError {
    pub(crate) fn malformed(addr: &str, reason: &'static str) -> Self {
        Self::MalformedPeerAddr {
            addr: addr.to_string(),
            reason,
        }
    }
}

/// Application-wide error types with appropriate HTTP status codes.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection peer address is not available")]
    MissingPeerAddr,

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Full details stay in the server log
        tracing::error!(error = %self, "Request failed");

        let (status, error_type, message) = match &self {
            AppError::MissingPeerAddr => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "client_ip_unavailable",
                "Client address could not be determined.",
            ),
            AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "Service configuration error. Please contact support.",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred. Please contact support if the issue persists.",
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
