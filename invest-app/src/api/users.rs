//! User administration (admin only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::auth::{require_role, CurrentUser};
use crate::db::{self, now};
use crate::error::{ApiError, ApiResult};
use crate::models::{Role, User};
use crate::services::password::hash_password;
use crate::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub password: Option<String>,
}

fn check_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// GET /api/users
pub async fn list_users(State(state): State<AppState>, CurrentUser(actor): CurrentUser) -> ApiResult<Json<Vec<User>>> {
    require_role(&actor, Role::Admin)?;
    Ok(Json(db::users::list_users(&state.db).await?))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    require_role(&actor, Role::Admin)?;

    let username = body.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::BadRequest("username is required".to_string()));
    }
    check_password(&body.password)?;
    if db::users::get_user_by_username(&state.db, &username).await?.is_some() {
        return Err(ApiError::Conflict(format!("Username '{}' is taken", username)));
    }

    let created = now();
    let user = User {
        id: Uuid::new_v4(),
        display_name: body
            .display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| username.clone()),
        username,
        email: body.email.filter(|e| !e.trim().is_empty()),
        role: body.role,
        active: true,
        password_hash: hash_password(&body.password)?,
        created_at: created,
        updated_at: created,
    };
    db::users::insert_user(&state.db, &user).await?;

    info!(user = %user.username, role = %user.role, by = %actor.username, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /api/users/:id
///
/// Deactivation or a password change ends the user's sessions.
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    require_role(&actor, Role::Admin)?;

    let mut user = db::users::get_user(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {}", id)))?;

    if id == actor.id && (body.active == Some(false) || body.role.is_some_and(|r| r != Role::Admin)) {
        return Err(ApiError::BadRequest(
            "Admins cannot deactivate or demote themselves".to_string(),
        ));
    }

    let mut end_sessions = false;
    if let Some(name) = body.display_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
        user.display_name = name;
    }
    if let Some(email) = body.email {
        user.email = Some(email).filter(|e| !e.trim().is_empty());
    }
    if let Some(role) = body.role {
        user.role = role;
    }
    if let Some(active) = body.active {
        end_sessions |= user.active && !active;
        user.active = active;
    }
    if let Some(password) = body.password {
        check_password(&password)?;
        user.password_hash = hash_password(&password)?;
        end_sessions = true;
    }
    user.updated_at = now();

    db::users::update_user(&state.db, &user).await?;
    if end_sessions {
        db::sessions::delete_user_sessions(&state.db, user.id).await?;
    }

    info!(user = %user.username, by = %actor.username, "User updated");
    Ok(Json(user))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id", put(update_user))
}
