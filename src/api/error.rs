//! HTTP error type.
//!
//! Handlers return `Result<T, ApiError>`; every error becomes a JSON body of
//! the form `{"detail": "..."}`. Internal failures are logged in full and
//! reported to the caller with a generic message.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::services::ExtractError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The locator is not an absolute http(s) URL
    #[error("Invalid URL: {0}")]
    InvalidLocator(String),

    /// The request body could not be decoded
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Extraction failed: No downloaded file found.")]
    NoArtifactFound,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Error body returned to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::ExtractionFailed(msg) => ApiError::ExtractionFailed(msg),
            ExtractError::NoArtifactFound => ApiError::NoArtifactFound,
            ExtractError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidLocator(_) | ApiError::InvalidRequest(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::ExtractionFailed(_) | ApiError::NoArtifactFound => StatusCode::BAD_REQUEST,
            ApiError::Internal(msg) => {
                error!(message = %msg, "internal server error");
                let body = ErrorResponse {
                    detail: "internal server error".to_string(),
                };
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
            }
        };

        let body = ErrorResponse {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
