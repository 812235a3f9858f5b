//! Notification inbox

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::Notification;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

/// GET /api/notifications?unread=
pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(
        db::notifications::list_notifications(&state.db, user.id, query.unread).await?,
    ))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    if !db::notifications::mark_read(&state.db, id, user.id).await? {
        return Err(ApiError::NotFound(format!("Notification {}", id)));
    }
    Ok(Json(json!({ "id": id, "read": true })))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Json<Value>> {
    let updated = db::notifications::mark_all_read(&state.db, user.id).await?;
    Ok(Json(json!({ "updated": updated })))
}

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/read-all", post(mark_all_read))
        .route("/api/notifications/:id/read", post(mark_read))
}
