//! Error responses for the LLM microservice
//!
//! Every failure renders as `{"success": false, "error": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::LlmError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request field (400)
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Llm(err) => match err {
                LlmError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                LlmError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
                LlmError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                LlmError::Network(_)
                | LlmError::InvalidApiKey
                | LlmError::RateLimited
                | LlmError::Api { .. }
                | LlmError::Parse(_)
                | LlmError::VectorStore(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Llm(LlmError::InvalidInput(msg)) => msg.clone(),
            ApiError::Llm(err) => err.to_string(),
        };
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", message);
        }

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Successful reply: `{"success": true, ...fields of T}`
#[derive(Debug, Serialize)]
pub struct Success<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

pub fn success<T: Serialize>(data: T) -> Json<Success<T>> {
    Json(Success { success: true, data })
}

/// Require a non-blank string field
pub fn required(value: Option<String>, message: &str) -> ApiResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(LlmError::InvalidInput("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LlmError::NotConfigured("Anthropic".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ApiError::from(LlmError::RateLimited).status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_required_rejects_blank() {
        assert!(required(Some("  ".into()), "query is required").is_err());
        assert!(required(None, "query is required").is_err());
        assert_eq!(required(Some("q".into()), "x").unwrap(), "q");
    }

    #[test]
    fn test_success_flattens_fields() {
        #[derive(Serialize)]
        struct Body {
            answer: &'static str,
        }
        let Json(body) = success(Body { answer: "42" });
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["answer"], "42");
    }
}
