//! Document upload, analysis and search endpoints

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::info;

use super::error::{required, success, ApiError, ApiResult, Success};
use crate::prompts::AnalysisType;
use crate::services::{AnalysisOutcome, DocumentSource, SearchOutcome, UploadOutcome};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub file_path: Option<PathBuf>,
    /// Base64 encoded file content; requires `filename`
    pub file_content: Option<String>,
    pub filename: Option<String>,
    pub vector_store_id: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl UploadRequest {
    fn source(self) -> ApiResult<(DocumentSource, Option<String>, Map<String, Value>)> {
        let source = match (self.file_path, self.file_content, self.filename) {
            (Some(path), _, _) => DocumentSource::Path(path),
            (None, Some(content), Some(filename)) if !filename.trim().is_empty() => {
                DocumentSource::Base64 { content, filename }
            }
            (None, Some(_), _) => {
                return Err(ApiError::BadRequest(
                    "filename is required with file_content".to_string(),
                ))
            }
            (None, None, _) => {
                return Err(ApiError::BadRequest(
                    "Either file_path or file_content is required".to_string(),
                ))
            }
        };
        Ok((source, self.vector_store_id, self.attributes))
    }
}

/// POST /documents/upload-and-vectorize
pub async fn upload_and_vectorize(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<Json<Success<UploadOutcome>>> {
    let (source, vector_store_id, attributes) = request.source()?;
    let vector_store_id = state.services.vector_store_or_default(vector_store_id)?;

    let outcome = state
        .services
        .documents
        .upload_and_vectorize(source, &vector_store_id, &attributes)
        .await?;
    info!(file_id = %outcome.file.id, "Upload request completed");

    Ok(success(outcome))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub document_id: Option<String>,
    pub analysis_type: Option<String>,
}

/// POST /documents/analyze
pub async fn analyze_document(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<Success<AnalysisOutcome>>> {
    let document_id = required(request.document_id, "document_id is required")?;
    let analysis_type = AnalysisType::parse(request.analysis_type.as_deref().unwrap_or("general"));

    let outcome = state
        .services
        .analysis
        .analyze_document(&document_id, analysis_type)
        .await?;
    Ok(success(outcome))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
    #[serde(default)]
    pub document_ids: Vec<String>,
    pub vector_store_id: Option<String>,
}

/// POST /documents/search
pub async fn search_documents(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<Success<SearchOutcome>>> {
    let query = required(request.query, "query is required")?;
    let vector_store_id = state.services.vector_store_or_default(request.vector_store_id)?;

    let outcome = state
        .services
        .documents
        .search_documents(&query, &request.document_ids, &vector_store_id)
        .await?;
    Ok(success(outcome))
}

pub fn document_routes() -> Router<AppState> {
    Router::new()
        .route("/documents/upload-and-vectorize", post(upload_and_vectorize))
        .route("/documents/analyze", post(analyze_document))
        .route("/documents/search", post(search_documents))
}
