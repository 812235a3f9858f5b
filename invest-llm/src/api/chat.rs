//! Chat completion and document question answering endpoints

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use super::error::{required, success, ApiError, ApiResult, Success};
use crate::services::{ChatOutcome, QaOutcome};
use crate::types::ChatMessage;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
}

/// POST /chat/completion
pub async fn chat_completion(
    State(state): State<AppState>,
    Json(request): Json<CompletionRequest>,
) -> ApiResult<Json<Success<ChatOutcome>>> {
    if request.messages.is_empty() {
        return Err(ApiError::BadRequest("messages are required".to_string()));
    }

    let outcome = state
        .services
        .chat
        .completion(&request.messages, request.model.as_deref())
        .await?;
    Ok(success(outcome))
}

#[derive(Debug, Default, Deserialize)]
pub struct QaContext {
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentQaRequest {
    pub question: Option<String>,
    #[serde(default)]
    pub document_ids: Vec<String>,
    pub vector_store_id: Option<String>,
    #[serde(default)]
    pub context: QaContext,
}

/// POST /chat/document-qa
///
/// Prior turns from `context.conversation_history` precede the question.
pub async fn document_qa(
    State(state): State<AppState>,
    Json(request): Json<DocumentQaRequest>,
) -> ApiResult<Json<Success<QaOutcome>>> {
    let question = required(request.question, "question is required")?;
    let vector_store_id = state.services.vector_store_or_default(request.vector_store_id)?;

    let outcome = state
        .services
        .chat
        .document_qa(
            &question,
            &request.document_ids,
            &vector_store_id,
            request.context.conversation_history,
        )
        .await?;
    Ok(success(outcome))
}

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/chat/completion", post(chat_completion))
        .route("/chat/document-qa", post(document_qa))
}
