//! Investment request handlers and workflow actions

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use invest_llm::prompts::InsightFocus;
use invest_llm::DocumentIntelligence;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::db::{self, now, requests::RequestFilter};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Approval, Document, InvestmentRequest, RequestStatus, RiskLevel, Role, Task, User,
};
use crate::AppState;

pub const DEFAULT_CURRENCY: &str = "USD";

/// Analysts only see their own requests; reviewers see everything
pub fn can_view(user: &User, request: &InvestmentRequest) -> bool {
    user.role != Role::Analyst || request.requester_id == user.id
}

pub fn can_edit(user: &User, request: &InvestmentRequest) -> bool {
    request.requester_id == user.id || user.is_admin()
}

/// Load a live request the user may see
pub async fn load_visible(state: &AppState, user: &User, id: Uuid) -> ApiResult<InvestmentRequest> {
    let request = db::requests::get_request(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Request {}", id)))?;

    if !can_view(user, &request) {
        return Err(ApiError::Forbidden(format!(
            "Request {} belongs to another analyst",
            request.request_code
        )));
    }
    Ok(request)
}

pub fn intelligence(state: &AppState) -> ApiResult<Arc<dyn DocumentIntelligence>> {
    state
        .intelligence
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("AI analysis is not configured".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    #[serde(default)]
    pub mine: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    pub template_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub investment_type: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub expected_return: Option<f64>,
    pub risk_level: Option<RiskLevel>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequestBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub investment_type: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub expected_return: Option<f64>,
    pub risk_level: Option<RiskLevel>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DecisionBody {
    pub comments: Option<String>,
}

/// Parse an optional JSON body
///
/// An empty body yields `T::default()`; anything else must be valid JSON.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}

#[derive(Debug, Default, Deserialize)]
pub struct InsightsBody {
    pub focus: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub question: String,
}

/// GET /api/requests/:id response
#[derive(Debug, Serialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: InvestmentRequest,
    pub approvals: Vec<Approval>,
    pub tasks: Vec<Task>,
    pub documents: Vec<Document>,
}

#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    pub request_id: Uuid,
    pub focus: InsightFocus,
    pub document_ids: Vec<String>,
    pub insights: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub request_id: Uuid,
    pub question: String,
    pub answer: String,
    pub document_ids: Vec<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate(request: &InvestmentRequest) -> ApiResult<()> {
    if request.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    if request.investment_type.trim().is_empty() {
        return Err(ApiError::BadRequest("investment_type is required".to_string()));
    }
    if !(request.amount.is_finite() && request.amount > 0.0) {
        return Err(ApiError::BadRequest("amount must be greater than zero".to_string()));
    }
    if request.currency.len() != 3 || !request.currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::BadRequest(format!(
            "currency must be a three-letter code, got '{}'",
            request.currency
        )));
    }
    Ok(())
}

/// GET /api/requests?status=&mine=
pub async fn list_requests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<InvestmentRequest>>> {
    let status = non_blank(query.status)
        .map(|s| s.parse::<RequestStatus>())
        .transpose()?;
    let own_only = query.mine || user.role == Role::Analyst;

    let filter = RequestFilter {
        status,
        requester_id: own_only.then_some(user.id),
    };
    Ok(Json(db::requests::list_requests(&state.db, &filter).await?))
}

/// POST /api/requests
///
/// Fields missing from the body are filled from `template_id` when given.
pub async fn create_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateRequestBody>,
) -> ApiResult<(StatusCode, Json<InvestmentRequest>)> {
    let template = match body.template_id {
        Some(id) => Some(
            db::templates::get_template(&state.db, id)
                .await?
                .ok_or_else(|| ApiError::BadRequest(format!("Template {} does not exist", id)))?,
        ),
        None => None,
    };

    let created = now();
    let mut request = InvestmentRequest {
        id: Uuid::new_v4(),
        request_code: String::new(),
        title: non_blank(body.title).unwrap_or_default(),
        description: body
            .description
            .or_else(|| template.as_ref().map(|t| t.description.clone()))
            .unwrap_or_default(),
        investment_type: non_blank(body.investment_type)
            .or_else(|| template.as_ref().map(|t| t.investment_type.clone()))
            .unwrap_or_default(),
        amount: body
            .amount
            .or_else(|| template.as_ref().and_then(|t| t.default_amount))
            .unwrap_or(0.0),
        currency: non_blank(body.currency)
            .or_else(|| template.as_ref().map(|t| t.default_currency.clone()))
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
            .to_ascii_uppercase(),
        expected_return: body.expected_return,
        risk_level: body
            .risk_level
            .or_else(|| template.as_ref().and_then(|t| t.default_risk_level))
            .unwrap_or(RiskLevel::Medium),
        status: RequestStatus::Draft,
        requester_id: user.id,
        template_id: template.as_ref().map(|t| t.id),
        created_at: created,
        updated_at: created,
        submitted_at: None,
        decided_at: None,
    };
    validate(&request)?;

    let mut tx = state.db.begin().await.map_err(invest_common::Error::from)?;
    db::requests::insert_request(&mut tx, &mut request).await?;
    tx.commit().await.map_err(invest_common::Error::from)?;

    info!(request = %request.request_code, by = %user.username, "Request created");
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/requests/:id
pub async fn get_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RequestDetail>> {
    let request = load_visible(&state, &user, id).await?;

    Ok(Json(RequestDetail {
        approvals: db::approvals::list_approvals(&state.db, id).await?,
        tasks: db::tasks::list_tasks_for_request(&state.db, id).await?,
        documents: db::documents::list_documents_for_request(&state.db, id).await?,
        request,
    }))
}

/// PUT /api/requests/:id
pub async fn update_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRequestBody>,
) -> ApiResult<Json<InvestmentRequest>> {
    let mut request = load_visible(&state, &user, id).await?;
    if !can_edit(&user, &request) {
        return Err(ApiError::Forbidden("Only the requester can edit a request".to_string()));
    }
    if !request.status.is_editable() {
        return Err(ApiError::Conflict(format!(
            "Request {} cannot be edited while '{}'",
            request.request_code, request.status
        )));
    }

    if let Some(title) = non_blank(body.title) {
        request.title = title;
    }
    if let Some(description) = body.description {
        request.description = description;
    }
    if let Some(investment_type) = non_blank(body.investment_type) {
        request.investment_type = investment_type;
    }
    if let Some(amount) = body.amount {
        request.amount = amount;
    }
    if let Some(currency) = non_blank(body.currency) {
        request.currency = currency.to_ascii_uppercase();
    }
    if body.expected_return.is_some() {
        request.expected_return = body.expected_return;
    }
    if let Some(risk_level) = body.risk_level {
        request.risk_level = risk_level;
    }
    validate(&request)?;
    request.updated_at = now();

    if !db::requests::update_request(&state.db, &request).await? {
        return Err(ApiError::Conflict(format!(
            "Request {} changed status while being edited",
            request.request_code
        )));
    }
    Ok(Json(request))
}

/// DELETE /api/requests/:id
pub async fn delete_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let request = load_visible(&state, &user, id).await?;
    if !can_edit(&user, &request) {
        return Err(ApiError::Forbidden("Only the requester can delete a request".to_string()));
    }
    if !request.status.is_editable() {
        return Err(ApiError::Conflict(format!(
            "Request {} cannot be deleted while '{}'",
            request.request_code, request.status
        )));
    }

    if !db::requests::soft_delete_request(&state.db, id).await? {
        return Err(ApiError::Conflict(format!(
            "Request {} changed status while being deleted",
            request.request_code
        )));
    }
    info!(request = %request.request_code, by = %user.username, "Request deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/requests/:id/submit
pub async fn submit_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvestmentRequest>> {
    Ok(Json(state.workflow.submit(id, &user).await?))
}

/// POST /api/requests/:id/approve
pub async fn approve_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<InvestmentRequest>> {
    let comments = optional_body::<DecisionBody>(&body)?.comments;
    Ok(Json(state.workflow.approve(id, &user, comments).await?))
}

/// POST /api/requests/:id/reject
pub async fn reject_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<InvestmentRequest>> {
    let comments = optional_body::<DecisionBody>(&body)?.comments;
    Ok(Json(state.workflow.reject(id, &user, comments).await?))
}

/// POST /api/requests/:id/request-changes
pub async fn request_changes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<InvestmentRequest>> {
    let comments = optional_body::<DecisionBody>(&body)?.comments;
    Ok(Json(state.workflow.request_changes(id, &user, comments).await?))
}

/// GET /api/requests/:id/approvals
pub async fn list_approvals(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Approval>>> {
    load_visible(&state, &user, id).await?;
    Ok(Json(db::approvals::list_approvals(&state.db, id).await?))
}

async fn analyzed_file_ids(state: &AppState, request: &InvestmentRequest) -> ApiResult<Vec<String>> {
    let file_ids = db::documents::vectorized_file_ids(&state.db, request.id).await?;
    if file_ids.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Request {} has no analyzed documents yet",
            request.request_code
        )));
    }
    Ok(file_ids)
}

/// POST /api/requests/:id/insights
///
/// Cross-document insights over every vectorized document of the request.
pub async fn generate_insights(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<InsightsResponse>> {
    let body: InsightsBody = optional_body(&body)?;
    let request = load_visible(&state, &user, id).await?;
    let intelligence = intelligence(&state)?;
    let file_ids = analyzed_file_ids(&state, &request).await?;

    let focus = body
        .focus
        .map(|f| InsightFocus::parse(&f))
        .unwrap_or(InsightFocus::General);
    let insights = intelligence.generate_insights(&file_ids, focus).await?;

    Ok(Json(InsightsResponse {
        request_id: request.id,
        focus,
        document_ids: file_ids,
        insights,
    }))
}

/// POST /api/requests/:id/ask
pub async fn ask_question(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AskBody>,
) -> ApiResult<Json<AskResponse>> {
    let question = body.question.trim().to_string();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question is required".to_string()));
    }

    let request = load_visible(&state, &user, id).await?;
    let intelligence = intelligence(&state)?;
    let file_ids = analyzed_file_ids(&state, &request).await?;

    let answer = intelligence.answer_question(&question, &file_ids).await?;

    Ok(Json(AskResponse {
        request_id: request.id,
        question,
        answer,
        document_ids: file_ids,
    }))
}

pub fn request_routes() -> Router<AppState> {
    Router::new()
        .route("/api/requests", get(list_requests).post(create_request))
        .route(
            "/api/requests/:id",
            get(get_request).put(update_request).delete(delete_request),
        )
        .route("/api/requests/:id/submit", post(submit_request))
        .route("/api/requests/:id/approve", post(approve_request))
        .route("/api/requests/:id/reject", post(reject_request))
        .route("/api/requests/:id/request-changes", post(request_changes))
        .route("/api/requests/:id/approvals", get(list_approvals))
        .route("/api/requests/:id/insights", post(generate_insights))
        .route("/api/requests/:id/ask", post(ask_question))
}
