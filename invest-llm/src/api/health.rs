//! Health and service information endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub openai_configured: bool,
    pub anthropic_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_vector_store: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "invest-llm".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        openai_configured: true,
        anthropic_configured: state.services.chat.anthropic_configured(),
        default_vector_store: state.services.default_vector_store_id.clone(),
        last_error,
    })
}

/// GET /info
///
/// Lists endpoints and the models callers may request.
pub async fn service_info(State(state): State<AppState>) -> Json<Value> {
    let anthropic_models: &[&str] = if state.services.chat.anthropic_configured() {
        &["claude-3-sonnet", "claude-3-haiku"]
    } else {
        &[]
    };

    Json(json!({
        "service": "invest-llm",
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": env!("GIT_HASH"),
        "description": "AI operations for investment requests: document processing, chat and analysis",
        "endpoints": {
            "GET /health": "Service health check",
            "GET /info": "Service information",
            "POST /documents/upload-and-vectorize": "Upload file to vector store with metadata",
            "POST /documents/analyze": "Analyze document content",
            "POST /documents/search": "Search across documents",
            "POST /chat/completion": "Chat completion",
            "POST /chat/document-qa": "Question answering on documents",
            "POST /analysis/summarize": "Text or document summarization",
            "POST /analysis/investment-insights": "Investment-specific analysis",
        },
        "default_model": state.services.default_model,
        "supported_models": {
            "openai": ["gpt-4o", "gpt-4", "gpt-3.5-turbo"],
            "anthropic": anthropic_models,
        },
    }))
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(service_info))
}
