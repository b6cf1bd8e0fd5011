use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::PipelineError;
use crate::documents::DocumentError;
use crate::storage::StorageError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(msg) => AppError::Validation(msg),
            PipelineError::ProviderCallFailed(failed) => AppError::Llm(failed.to_string()),
            invariant @ PipelineError::InvalidTransition { .. } => {
                AppError::Internal(anyhow::Error::new(invariant))
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateContent { existing_id } => AppError::Conflict(format!(
                "A CV with identical content already exists: {existing_id}"
            )),
            StorageError::NotFound(id) => AppError::NotFound(format!("CV {id} not found")),
            StorageError::Database(e) => AppError::Database(e),
            StorageError::S3(msg) => AppError::S3(msg),
            StorageError::Serialization(e) => AppError::Internal(e.into()),
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Unsupported { .. } => AppError::Validation(err.to_string()),
            DocumentError::Pdf { .. } | DocumentError::Encoding(_) | DocumentError::Empty(_) => {
                AppError::UnprocessableEntity(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "DUPLICATE_CONTENT", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "An AI provider call failed".to_string(),
                )
            }
            AppError::S3(msg) => {
                tracing::error!("S3 error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "S3_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{LlmError, ProviderCallFailed};
    use uuid::Uuid;

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_pipeline_errors_map_to_status() {
        assert_eq!(
            status_of(PipelineError::Validation("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PipelineError::ProviderCallFailed(ProviderCallFailed::new(
                "gemini",
                LlmError::EmptyContent
            ))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_storage_errors_map_to_status() {
        assert_eq!(
            status_of(StorageError::DuplicateContent {
                existing_id: Uuid::nil()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StorageError::NotFound(Uuid::nil())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StorageError::S3("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_document_errors_map_to_status() {
        assert_eq!(
            status_of(DocumentError::Unsupported {
                filename: "a.docx".into(),
                content_type: "application/msword".into()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DocumentError::Encoding("a.txt".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
