//! Error taxonomy for ingestion and processing.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::store::StoreError;

// ---

#[derive(thiserror::Error, Debug)]
pub enum ImportError {
    /// Client-correctable request problem.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Request body over the configured size limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    /// Stored content could not be turned into reading items.
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found")]
    NotFound,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    error: String,
}

impl IntoResponse for ImportError {
    fn into_response(self) -> Response {
        // ---
        let status = match self {
            ImportError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ImportError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ImportError::NotFound => StatusCode::NOT_FOUND,
            ImportError::Storage(_) | ImportError::Decode(_) => {
                tracing::error!("Request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse {
            status: "error",
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
