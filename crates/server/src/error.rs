//! API error types.

use crate::publish::PublishError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quotagate_index::IndexError;
use quotagate_verifier::VerifierError;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Core(#[from] quotagate_core::Error),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("verification error: {0}")]
    Verifier(#[from] VerifierError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Internal(_) => "internal_error",
            Self::Core(_) => "invalid_input",
            Self::Index(e) => match e {
                IndexError::NotReady(_) | IndexError::BuildInProgress => "index_not_ready",
                _ => "index_error",
            },
            Self::Verifier(e) => match e {
                VerifierError::NotReady(_) => "index_not_ready",
                VerifierError::Cancelled => "cancelled",
                VerifierError::TimedOut(_) => "timeout",
                VerifierError::BatchTooLarge { .. } => "batch_too_large",
                VerifierError::Index(_) => "index_error",
                VerifierError::Internal(_) => "internal_error",
            },
            Self::Publish(e) => match e {
                PublishError::Disabled => "publish_disabled",
                _ => "publish_error",
            },
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(_) => StatusCode::BAD_REQUEST,
            Self::Index(e) => match e {
                IndexError::NotReady(_) | IndexError::BuildInProgress => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Verifier(e) => match e {
                VerifierError::NotReady(_) | VerifierError::Cancelled => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                VerifierError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
                VerifierError::BatchTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                VerifierError::Index(_) | VerifierError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Publish(e) => match e {
                PublishError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
