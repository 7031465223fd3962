//! Axum-specific error types and mappings.
//!
//! Maps `StreamError` and `UploadError` to HTTP status codes and JSON bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use streamflow_core::StreamError;

use crate::uploads::UploadError;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The backend or process manager could not do the work right now.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HttpError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::ServiceUnavailable(msg)
            | Self::Internal(msg) => msg,
        };
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %message, "Request failed");
        }

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<StreamError> for HttpError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::InvalidInput(msg) => Self::BadRequest(msg),
            StreamError::Spawn(msg) | StreamError::ExternalManager(msg) => {
                Self::ServiceUnavailable(msg)
            }
            StreamError::NotFound(id) => Self::NotFound(format!("Stream {id} not found")),
            StreamError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<UploadError> for HttpError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Missing | UploadError::Body(_) => Self::BadRequest(err.to_string()),
            UploadError::Io(e) => Self::Internal(format!("Failed to store upload: {e}")),
        }
    }
}
