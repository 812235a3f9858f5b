//! Background job inspection and manual retry

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::db::{self, retry_on_lock, retry::DEFAULT_MAX_LOCK_WAIT_MS};
use crate::error::{ApiError, ApiResult};
use crate::models::{AnalysisStatus, BackgroundJob, JobStatus, Role, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    pub status: Option<String>,
}

/// Load a job whose request the user may see; analysts only see their own
async fn load_visible_job(state: &AppState, user: &User, id: Uuid) -> ApiResult<BackgroundJob> {
    let job = db::jobs::get_job(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job {}", id)))?;

    if user.role == Role::Analyst && db::jobs::job_requester(&state.db, id).await? != Some(user.id) {
        return Err(ApiError::Forbidden(format!("Job {} belongs to another analyst", id)));
    }
    Ok(job)
}

/// GET /api/jobs?status=
pub async fn list_jobs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<JobQuery>,
) -> ApiResult<Json<Vec<BackgroundJob>>> {
    let status = query
        .status
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<JobStatus>())
        .transpose()?;

    let requester_id = (user.role == Role::Analyst).then_some(user.id);
    Ok(Json(db::jobs::list_jobs(&state.db, status, requester_id).await?))
}

/// GET /api/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BackgroundJob>> {
    load_visible_job(&state, &user, id).await.map(Json)
}

/// POST /api/jobs/:id/retry
///
/// A failed job returns to `pending` with its attempt count reset; it
/// resumes at the step that failed.
pub async fn retry_job(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BackgroundJob>> {
    let job = load_visible_job(&state, &user, id).await?;

    let requeued = retry_on_lock("retry job", DEFAULT_MAX_LOCK_WAIT_MS, || {
        db::jobs::retry_failed_job(&state.db, id)
    })
    .await?;
    if !requeued {
        return Err(ApiError::Conflict(format!(
            "Job {} is '{}'; only failed jobs can be retried",
            id, job.status
        )));
    }

    db::documents::set_analysis_status(&state.db, job.document_id, AnalysisStatus::Pending).await?;
    state.job_wakeup.notify_one();
    info!(job_id = %id, by = %user.username, "Failed job requeued");

    db::jobs::get_job(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job {}", id)))
}

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/:id", get(get_job))
        .route("/api/jobs/:id/retry", post(retry_job))
}
