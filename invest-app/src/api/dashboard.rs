//! Per-user dashboard counters

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;

use super::auth::CurrentUser;
use crate::db;
use crate::error::ApiResult;
use crate::models::Role;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    /// Requests visible to the caller, by status
    pub requests_by_status: BTreeMap<String, i64>,
    pub total_requests: i64,
    pub pending_tasks: i64,
    pub jobs_by_status: BTreeMap<String, i64>,
    pub unread_notifications: i64,
}

/// GET /api/dashboard
pub async fn dashboard(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Json<DashboardResponse>> {
    let requester = (user.role == Role::Analyst).then_some(user.id);
    let requests_by_status: BTreeMap<String, i64> = db::requests::count_by_status(&state.db, requester)
        .await?
        .into_iter()
        .collect();
    let jobs_by_status: BTreeMap<String, i64> = db::jobs::count_by_status(&state.db).await?.into_iter().collect();

    Ok(Json(DashboardResponse {
        total_requests: requests_by_status.values().sum(),
        requests_by_status,
        pending_tasks: db::tasks::count_pending_for_user(&state.db, &user).await?,
        jobs_by_status,
        unread_notifications: db::notifications::unread_count(&state.db, user.id).await?,
    }))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/api/dashboard", get(dashboard))
}
