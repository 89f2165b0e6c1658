//! HTTP error type and the mapping from domain errors to status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use pactum_core::WorkflowError;
use pactum_storage::{ApplyError, StorageError};

use crate::auth::AuthError;

/// A JSON error response: `{"error": "<message>"}` with a status code.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, message)
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::UNAUTHORIZED, message)
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::FORBIDDEN, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let status = match &err {
            WorkflowError::Authorization { .. } => StatusCode::FORBIDDEN,
            WorkflowError::IllegalTransition { .. } | WorkflowError::Validation { .. } => {
                StatusCode::BAD_REQUEST
            }
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let status = match &err {
            StorageError::ConcurrentConflict { .. } => StatusCode::CONFLICT,
            StorageError::ContractNotFound { .. }
            | StorageError::AttachmentNotFound { .. }
            | StorageError::UserNotFound { .. }
            | StorageError::UnknownUsername { .. }
            | StorageError::BlobNotFound { .. } => StatusCode::NOT_FOUND,
            StorageError::DuplicateUsername { .. } => StatusCode::BAD_REQUEST,
            StorageError::Backend(_) => {
                tracing::error!("storage backend failure: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<ApplyError> for ApiError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::Workflow(e) => e.into(),
            ApplyError::Storage(e) => e.into(),
            ApplyError::Forbidden { .. } => ApiError::forbidden(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::unauthorized(err.to_string())
    }
}
