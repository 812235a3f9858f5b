//! Summarization and investment insight endpoints

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use super::error::{success, ApiError, ApiResult, Success};
use crate::prompts::{InsightFocus, SummaryType};
use crate::services::{InsightsOutcome, SummarizeInput, SummaryOutcome};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub content: Option<String>,
    pub document_id: Option<String>,
    pub summary_type: Option<String>,
}

/// POST /analysis/summarize
///
/// Inline `content` wins over `document_id` when both are present.
pub async fn summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> ApiResult<Json<Success<SummaryOutcome>>> {
    let blank = |v: &String| v.trim().is_empty();
    let input = match (request.content, request.document_id) {
        (Some(content), _) if !blank(&content) => SummarizeInput::Text(content),
        (_, Some(id)) if !blank(&id) => SummarizeInput::Document(id),
        _ => {
            return Err(ApiError::BadRequest(
                "content or document_id is required".to_string(),
            ))
        }
    };
    let summary_type = SummaryType::parse(request.summary_type.as_deref().unwrap_or("general"));

    let outcome = state.services.analysis.summarize(input, summary_type).await?;
    Ok(success(outcome))
}

#[derive(Debug, Deserialize)]
pub struct InsightsRequest {
    #[serde(default)]
    pub document_ids: Vec<String>,
    pub analysis_focus: Option<String>,
}

/// POST /analysis/investment-insights
pub async fn investment_insights(
    State(state): State<AppState>,
    Json(request): Json<InsightsRequest>,
) -> ApiResult<Json<Success<InsightsOutcome>>> {
    if request.document_ids.is_empty() {
        return Err(ApiError::BadRequest("document_ids are required".to_string()));
    }
    let focus = InsightFocus::parse(request.analysis_focus.as_deref().unwrap_or("general"));

    let outcome = state
        .services
        .analysis
        .investment_insights(&request.document_ids, focus)
        .await?;
    Ok(success(outcome))
}

pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analysis/summarize", post(summarize))
        .route("/analysis/investment-insights", post(investment_insights))
}
