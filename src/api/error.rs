use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;
use crate::validate::ValidationError;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors a handler can classify, translated into specific responses.
/// Everything else lands in `Internal`, which logs the cause server-side
/// and answers with a generic 500 body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Alias already exists")]
    AliasExists,

    #[error("Failed to generate a unique short code")]
    CodeExhausted,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::AliasExists => (StatusCode::CONFLICT, self.to_string()),
            ApiError::CodeExhausted => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => ApiError::AliasExists,
            StorageError::Other(e) => ApiError::Internal(e),
        }
    }
}
