//! Session login and the authenticated-user extractor
//!
//! The session token travels in the `invest_session` cookie; the server
//! keeps only its SHA-256 digest.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Duration;
use invest_common::api::{generate_session_token, hash_token};
use invest_common::db::get_i64_setting;
use serde::Deserialize;
use tracing::{info, warn};

use crate::db::{self, now};
use crate::error::{ApiError, ApiResult};
use crate::models::{Role, User};
use crate::services::password::verify_password;
use crate::AppState;

pub const SESSION_COOKIE: &str = "invest_session";
pub const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 86_400;

/// The user owning the request's session
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let user = db::sessions::user_for_session(&state.db, &hash_token(&token))
            .await?
            .ok_or(ApiError::Unauthorized)?;
        Ok(CurrentUser(user))
    }
}

/// Fail with 403 unless the user holds `role` (admins always pass)
pub fn require_role(user: &User, role: Role) -> ApiResult<()> {
    if user.has_role(role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("Requires role '{}'", role)))
    }
}

/// Value of the session cookie, if present
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn session_cookie(token: &str, max_age_secs: i64) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    ))
    .map_err(|e| ApiError::Internal(format!("Invalid session cookie: {}", e)))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/auth/login
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> ApiResult<Response> {
    let user = db::users::get_user_by_username(&state.db, body.username.trim()).await?;

    let user = match user {
        Some(user) if user.active && verify_password(&body.password, &user.password_hash)? => user,
        _ => {
            warn!(username = %body.username, "Failed login");
            return Err(ApiError::Unauthorized);
        }
    };

    let timeout = get_i64_setting(&state.db, "session_timeout_seconds", DEFAULT_SESSION_TIMEOUT_SECS)
        .await?
        .max(60);
    let token = generate_session_token();
    db::sessions::create_session(&state.db, &hash_token(&token), user.id, now() + Duration::seconds(timeout))
        .await?;

    info!(user = %user.username, role = %user.role, "User logged in");

    let mut response = Json(&user).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, session_cookie(&token, timeout)?);
    Ok(response)
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    if let Some(token) = session_token(&headers) {
        db::sessions::delete_session(&state.db, &hash_token(&token)).await?;
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, session_cookie("", 0)?);
    Ok(response)
}

/// GET /api/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}
