//--------------------------------------------------------------------------------------------------
// ENUMS
//--------------------------------------------------------------------------------------------------
// | Name            | Description                                      | Key Methods         |
// |-----------------|--------------------------------------------------|---------------------|
// | ApiError        | HTTP-facing outcome of a request (spec.md §7)    | into_response       |
//--------------------------------------------------------------------------------------------------

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::services::ingest::IngestError;
use crate::domain::services::storage::StorageError;

/// Type alias for Result with ApiError
pub type ApiResult<T> = Result<T, ApiError>;

/// Error kinds from spec.md §7, taxonomic rather than free-form strings.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("duplicate event_id")]
    Duplicate,

    #[error("order already finalized")]
    Finalized,

    #[error("storage error: {0}")]
    Storage(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, "validation", msg.clone()),
            Self::Duplicate => (StatusCode::CONFLICT, "duplicate", self.to_string()),
            Self::Finalized => (StatusCode::GONE, "finalized", self.to_string()),
            Self::Storage(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "storage", msg.clone()),
        };

        let body = Json(json!({
            "error": {
                "kind": kind,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Duplicate { .. } => Self::Duplicate,
            IngestError::Finalized { .. } => Self::Finalized,
            IngestError::InvalidSequence(e) => Self::Validation(e.to_string()),
            IngestError::Storage(e) => Self::Storage(e.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}
