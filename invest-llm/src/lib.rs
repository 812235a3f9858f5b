//! invest-llm library interface
//!
//! Provider clients, prompt catalogs, filename metadata extraction and the
//! document/analysis/chat services shared by the LLM microservice and the
//! approval application's background job processor.

pub mod anthropic;
pub mod api;
pub mod error;
pub mod filters;
pub mod metadata;
pub mod openai;
pub mod prompts;
pub mod retry;
pub mod services;
pub mod types;

pub use crate::error::{LlmError, LlmResult};
pub use crate::services::{DocumentIntelligence, LlmGateway, LlmServices, LlmSettings};

use axum::{middleware, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<LlmServices>,
    /// Key callers must present on every protected route
    pub service_api_key: Arc<String>,
    pub startup_time: DateTime<Utc>,
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(services: LlmServices, service_api_key: String) -> Self {
        Self {
            services: Arc::new(services),
            service_api_key: Arc::new(service_api_key),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build the microservice router
///
/// `/health` and `/info` are open; everything else requires the service API key.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(api::document_routes())
        .merge(api::chat_routes())
        .merge(api::analysis_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::require_api_key,
        ));

    Router::new()
        .merge(api::health_routes())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
