//! API key middleware for the protected routes

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use invest_common::api::{extract_api_key, validate_api_key, ApiKeyError};
use serde_json::json;
use tracing::warn;

use crate::AppState;

/// Reject requests that do not carry the service API key
///
/// The key is read from `Authorization: Bearer`, then `X-API-Key`, then the
/// `api_key` query parameter.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let headers = request.headers();
    let authorization = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    let x_api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    let provided = extract_api_key(authorization, x_api_key, request.uri().query());

    match validate_api_key(provided.as_deref(), &state.service_api_key) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            warn!(path = %request.uri().path(), "Rejected request: {}", err);
            unauthorized(err)
        }
    }
}

fn unauthorized(err: ApiKeyError) -> Response {
    let message = match err {
        ApiKeyError::Missing => {
            "Provide API key in Authorization header, X-API-Key header, or api_key query parameter"
        }
        ApiKeyError::Invalid => "The provided API key is not valid",
    };

    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "success": false,
            "error": err.to_string(),
            "message": message,
        })),
    )
        .into_response()
}
