//! Error types for imt-api

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request data (400)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or invalid credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Prediction service unreachable or failed (500)
    #[error("Failed to call prediction API: {0}")]
    UpstreamUnavailable(String),

    /// Prediction service answered with an unparsable body (500)
    #[error("Failed to process API response: {0}")]
    UpstreamResponseInvalid(String),

    /// Store-level rejection (500)
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<imt_common::Error> for ApiError {
    fn from(err: imt_common::Error) -> Self {
        match err {
            imt_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            imt_common::Error::InvalidInput(msg) => ApiError::InvalidInput(msg),
            imt_common::Error::Database(e) => ApiError::PersistenceFailure(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::UpstreamUnavailable(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UPSTREAM_UNAVAILABLE",
                msg,
            ),
            ApiError::UpstreamResponseInvalid(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UPSTREAM_RESPONSE_INVALID",
                msg,
            ),
            ApiError::PersistenceFailure(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_FAILURE",
                msg,
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
