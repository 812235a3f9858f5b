//! invest-app library interface
//!
//! Investment approval REST API: session authentication, the approval
//! workflow, tasks, notifications, templates, document upload and the
//! background document analysis processor.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use axum::Router;
use chrono::{DateTime, Utc};
use invest_common::events::EventBus;
use invest_llm::DocumentIntelligence;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;

use crate::services::{DocumentStorage, WorkflowService};

/// Event bus capacity shared by SSE subscribers
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub workflow: WorkflowService,
    pub storage: DocumentStorage,
    /// `None` when no OpenAI key is configured; AI endpoints answer 503
    pub intelligence: Option<Arc<dyn DocumentIntelligence>>,
    /// Wakes the job processor when a job is queued
    pub job_wakeup: Arc<Notify>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        uploads_root: PathBuf,
        intelligence: Option<Arc<dyn DocumentIntelligence>>,
    ) -> Self {
        Self {
            workflow: WorkflowService::new(db.clone(), event_bus.clone()),
            storage: DocumentStorage::new(uploads_root),
            db,
            event_bus,
            intelligence,
            job_wakeup: Arc::new(Notify::new()),
            startup_time: Utc::now(),
        }
    }
}

/// Build the application router
///
/// `/health` and `/api/auth/login` are open; every other handler extracts
/// [`api::auth::CurrentUser`] and answers 401 without a valid session.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes())
        .merge(api::user_routes())
        .merge(api::request_routes())
        .merge(api::task_routes())
        .merge(api::document_routes())
        .merge(api::job_routes())
        .merge(api::notification_routes())
        .merge(api::template_routes())
        .merge(api::dashboard_routes())
        .merge(api::event_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
