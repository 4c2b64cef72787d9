//! API error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Ingestion-time errors visible to the HTTP caller.
///
/// These are the only errors a caller ever sees; per-declaration decode and
/// publish failures are logged and skipped without affecting the response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No recognized destination header name was present on the request.
    #[error("missing X-Dest or X-Dest-* destination headers")]
    MissingDestinations,

    /// The request body could not be read.
    #[error("failed to read request body")]
    UnreadableBody,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingDestinations => StatusCode::BAD_REQUEST,
            Self::UnreadableBody => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error payload with a single message field.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error description.
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}
