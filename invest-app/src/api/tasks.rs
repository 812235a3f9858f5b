//! Task inbox

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::auth::CurrentUser;
use crate::db;
use crate::error::ApiResult;
use crate::models::{Task, TaskStatus};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub status: Option<String>,
}

/// GET /api/tasks?status=
///
/// Tasks assigned to the caller or to the caller's role.
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<TaskQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let status = query
        .status
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<TaskStatus>())
        .transpose()?;

    Ok(Json(db::tasks::list_tasks_for_user(&state.db, &user, status).await?))
}

pub fn task_routes() -> Router<AppState> {
    Router::new().route("/api/tasks", get(list_tasks))
}
