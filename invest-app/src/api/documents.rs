//! Document upload, download and analysis triggers

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use invest_common::db::get_i64_setting;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::auth::CurrentUser;
use super::requests::load_visible;
use crate::db::{self, now};
use crate::error::{ApiError, ApiResult};
use crate::models::{AnalysisStatus, BackgroundJob, Document, InvestmentRequest, User};
use crate::services::job_processor;
use crate::services::storage::{validate_upload, DEFAULT_MAX_UPLOAD_BYTES};
use crate::AppState;

/// Multipart field carrying files
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadedDocument {
    pub document: Document,
    pub job: BackgroundJob,
}

#[derive(Debug, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub jobs: Vec<BackgroundJob>,
}

async fn load_document(state: &AppState, user: &User, id: Uuid) -> ApiResult<(Document, InvestmentRequest)> {
    let document = db::documents::get_document(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {}", id)))?;
    let request = load_visible(state, user, document.request_id).await?;
    Ok((document, request))
}

/// POST /api/requests/:id/documents
///
/// Every `file` part becomes a document with a queued analysis job. Parts
/// are read and validated before anything is stored, and all documents are
/// committed together, so a rejected part leaves no trace.
pub async fn upload_documents(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Vec<UploadedDocument>>)> {
    let request = load_visible(&state, &user, request_id).await?;
    if request.status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Request {} is '{}'; documents can no longer be added",
            request.request_code, request.status
        )));
    }

    let max_bytes = get_i64_setting(&state.db, "upload_max_bytes", DEFAULT_MAX_UPLOAD_BYTES)
        .await?
        .max(1) as u64;
    let max_attempts = job_processor::max_attempts(&state.db).await;

    let parts = read_file_parts(&mut multipart, max_bytes).await?;
    if parts.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "No '{}' parts in the upload",
            FILE_FIELD
        )));
    }

    let mut stored_paths = Vec::with_capacity(parts.len());
    let mut documents = Vec::with_capacity(parts.len());
    for (original_name, bytes) in parts {
        let document_id = Uuid::new_v4();
        let stored = match state
            .storage
            .store(request.id, document_id, &original_name, &bytes, max_bytes)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                remove_all(&state, &stored_paths).await;
                return Err(e.into());
            }
        };

        let created = now();
        documents.push(Document {
            id: document_id,
            request_id: request.id,
            original_filename: original_name,
            stored_path: stored.path.to_string_lossy().into_owned(),
            mime_type: stored.mime_type.to_string(),
            size_bytes: stored.size_bytes as i64,
            uploaded_by: user.id,
            analysis_status: AnalysisStatus::Pending,
            openai_file_id: None,
            vector_store_file_id: None,
            summary: None,
            insights: None,
            metadata: None,
            created_at: created,
            updated_at: created,
        });
        stored_paths.push(stored.path);
    }

    let jobs = match insert_with_jobs(&state, &documents, max_attempts).await {
        Ok(jobs) => jobs,
        Err(e) => {
            remove_all(&state, &stored_paths).await;
            return Err(e);
        }
    };

    let uploaded: Vec<UploadedDocument> = documents
        .into_iter()
        .zip(jobs)
        .map(|(document, job)| {
            info!(
                document = %document.original_filename,
                request = %request.request_code,
                size = document.size_bytes,
                job_id = %job.id,
                "Document uploaded"
            );
            UploadedDocument { document, job }
        })
        .collect();

    state.job_wakeup.notify_one();
    Ok((StatusCode::CREATED, Json(uploaded)))
}

/// Buffer every `file` part, checking name and size as each one arrives
async fn read_file_parts(multipart: &mut Multipart, max_bytes: u64) -> ApiResult<Vec<(String, Vec<u8>)>> {
    let mut parts = Vec::new();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let original_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("file part has no filename".to_string()))?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            if (bytes.len() + chunk.len()) as u64 > max_bytes {
                return Err(ApiError::PayloadTooLarge(format!(
                    "File '{}' exceeds the {} byte limit",
                    original_name, max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        validate_upload(&original_name, bytes.len() as u64, max_bytes)?;
        parts.push((original_name, bytes));
    }
    Ok(parts)
}

async fn insert_with_jobs(
    state: &AppState,
    documents: &[Document],
    max_attempts: u32,
) -> ApiResult<Vec<BackgroundJob>> {
    let mut tx = state.db.begin().await.map_err(invest_common::Error::from)?;
    let mut jobs = Vec::with_capacity(documents.len());
    for document in documents {
        db::documents::insert_document(&mut *tx, document).await?;
        jobs.push(db::jobs::enqueue_job(&mut *tx, document.id, max_attempts).await?);
    }
    tx.commit().await.map_err(invest_common::Error::from)?;
    Ok(jobs)
}

async fn remove_all(state: &AppState, paths: &[std::path::PathBuf]) {
    for path in paths {
        state.storage.remove(path).await;
    }
}

/// GET /api/requests/:id/documents
pub async fn list_documents(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Document>>> {
    load_visible(&state, &user, request_id).await?;
    Ok(Json(
        db::documents::list_documents_for_request(&state.db, request_id).await?,
    ))
}

/// GET /api/documents/:id
pub async fn get_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DocumentDetail>> {
    let (document, _) = load_document(&state, &user, id).await?;
    let jobs = db::jobs::list_jobs_for_document(&state.db, id).await?;
    Ok(Json(DocumentDetail { document, jobs }))
}

/// GET /api/documents/:id/download
pub async fn download_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let (document, _) = load_document(&state, &user, id).await?;

    let bytes = tokio::fs::read(&document.stored_path).await.map_err(|e| {
        warn!(document_id = %id, path = %document.stored_path, "Stored upload unreadable: {}", e);
        ApiError::NotFound(format!("File for document {}", id))
    })?;

    let filename = crate::services::storage::sanitize_filename(&document.original_filename)
        .unwrap_or_else(|_| "document".to_string());
    let content_type = HeaderValue::from_str(&document.mime_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| ApiError::Internal(format!("Invalid filename header: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// DELETE /api/documents/:id
///
/// Uploader or admin. A queued job for the document fails when it runs.
pub async fn delete_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let (document, request) = load_document(&state, &user, id).await?;
    if document.uploaded_by != user.id && !user.is_admin() {
        return Err(ApiError::Forbidden(
            "Only the uploader can delete a document".to_string(),
        ));
    }

    db::documents::soft_delete_document(&state.db, id).await?;
    state
        .storage
        .remove(std::path::Path::new(&document.stored_path))
        .await;

    info!(
        document = %document.original_filename,
        request = %request.request_code,
        by = %user.username,
        "Document deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/documents/:id/analyze
///
/// Queue a fresh analysis unless one is already pending or running, in
/// which case that job is returned.
pub async fn analyze_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<BackgroundJob>)> {
    let (document, _) = load_document(&state, &user, id).await?;

    if let Some(active) = db::jobs::active_job_for_document(&state.db, id).await? {
        return Ok((StatusCode::OK, Json(active)));
    }

    let max_attempts = job_processor::max_attempts(&state.db).await;
    let job = db::jobs::enqueue_job(&state.db, document.id, max_attempts).await?;
    db::documents::set_analysis_status(&state.db, document.id, AnalysisStatus::Pending).await?;
    state.job_wakeup.notify_one();

    info!(document = %document.original_filename, job_id = %job.id, by = %user.username, "Analysis queued");
    Ok((StatusCode::ACCEPTED, Json(job)))
}

pub fn document_routes() -> Router<AppState> {
    // Size is enforced per file while streaming the multipart body
    let upload = Router::new()
        .route("/api/requests/:id/documents", post(upload_documents).get(list_documents))
        .layer(DefaultBodyLimit::disable());

    Router::new()
        .merge(upload)
        .route("/api/documents/:id", get(get_document).delete(delete_document))
        .route("/api/documents/:id/download", get(download_document))
        .route("/api/documents/:id/analyze", post(analyze_document))
}
