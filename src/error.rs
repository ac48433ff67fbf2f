//! Error types for prompt-relay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::relay::RelayFailure;

/// Result type alias for prompt-relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for prompt-relay.
///
/// Interrupted upstream streams and malformed upstream lines are not listed
/// here: the relay recovers from both locally and only logs them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Content cannot be empty.")]
    EmptyInput,

    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Upstream returned status {status}")]
    UpstreamStatus { status: u16, details: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl From<RelayFailure> for Error {
    fn from(failure: RelayFailure) -> Self {
        match failure {
            RelayFailure::Unreachable { reason } => Error::UpstreamUnreachable(reason),
            RelayFailure::Status { code, details } => Error::UpstreamStatus {
                status: code,
                details,
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::EmptyInput => {
                let body = serde_json::json!({ "detail": Error::EmptyInput.to_string() });
                (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
            }
            // Compatibility shape: the upstream status travels in the body
            Error::UpstreamStatus { status, details } => {
                let body = serde_json::json!({
                    "status_code": status,
                    "error": "Request failed",
                    "details": details,
                });
                (StatusCode::OK, axum::Json(body)).into_response()
            }
            Error::UpstreamUnreachable(reason) => {
                let body = serde_json::json!({ "detail": reason });
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
            }
            other => {
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                let body = serde_json::json!({
                    "error": {
                        "message": other.to_string(),
                        "type": "relay_error",
                        "code": status.as_u16()
                    }
                });
                (status, axum::Json(body)).into_response()
            }
        }
    }
}
