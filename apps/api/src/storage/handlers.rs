use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::documents::extract_text;
use crate::errors::AppError;
use crate::models::cv::{CvFileRow, CvSearchQuery, CvStats, NewCvFile};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
pub struct CvUploadResponse {
    pub content_id: Uuid,
    pub filename: String,
    pub text: String,
}

#[derive(Serialize)]
pub struct CvDetailResponse {
    #[serde(flatten)]
    pub file: CvFileRow,
    pub text: String,
}

/// POST /api/v1/cvs
/// Multipart: `file` (required), `job_description` (optional text).
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CvUploadResponse>), AppError> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;
    let mut job_description: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read file: {e}")))?;
                upload = Some((filename, content_type, bytes.to_vec()));
            }
            Some("job_description") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid job_description: {e}")))?;
                job_description = Some(text).filter(|t| !t.trim().is_empty());
            }
            _ => {}
        }
    }

    let (filename, content_type, blob) =
        upload.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    let (text, filename, content_type, blob) =
        extract_off_thread(filename, content_type, blob).await?;

    let content_id = state
        .store
        .put(
            blob,
            NewCvFile {
                filename: filename.clone(),
                content_type,
                job_description,
            },
        )
        .await?;
    info!("Uploaded CV {filename} as {content_id}");

    Ok((
        StatusCode::CREATED,
        Json(CvUploadResponse {
            content_id,
            filename,
            text,
        }),
    ))
}

/// PDF parsing is CPU-bound, so extraction runs on the blocking pool.
/// Inputs are handed back alongside the text for callers that still need them.
async fn extract_off_thread(
    filename: String,
    content_type: String,
    blob: Vec<u8>,
) -> Result<(String, String, String, Vec<u8>), AppError> {
    let (text, filename, content_type, blob) = tokio::task::spawn_blocking(move || {
        let text = extract_text(&filename, Some(&content_type), &blob);
        (text, filename, content_type, blob)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in extraction: {e}")))?;
    Ok((text?, filename, content_type, blob))
}

/// GET /api/v1/cvs
pub async fn handle_search(
    State(state): State<AppState>,
    Query(query): Query<CvSearchQuery>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<CvFileRow>>, AppError> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = page.offset.unwrap_or(0).max(0);
    Ok(Json(state.store.search(&query, limit, offset).await?))
}

/// GET /api/v1/cvs/stats
pub async fn handle_stats(State(state): State<AppState>) -> Result<Json<CvStats>, AppError> {
    Ok(Json(state.store.stats().await?))
}

/// GET /api/v1/cvs/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CvDetailResponse>, AppError> {
    let (blob, file) = state.store.get(id).await?;
    let (text, ..) =
        extract_off_thread(file.filename.clone(), file.content_type.clone(), blob).await?;
    Ok(Json(CvDetailResponse { file, text }))
}

/// DELETE /api/v1/cvs/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.store.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("CV {id} not found")))
    }
}
