//! Request templates
//!
//! Everyone may read templates; managers and admins maintain them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::auth::{require_role, CurrentUser};
use super::requests::DEFAULT_CURRENCY;
use crate::db::{self, now};
use crate::error::{ApiError, ApiResult};
use crate::models::{RiskLevel, Role, Template};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TemplateBody {
    pub name: Option<String>,
    pub investment_type: Option<String>,
    pub description: Option<String>,
    pub default_amount: Option<f64>,
    pub default_currency: Option<String>,
    pub default_risk_level: Option<RiskLevel>,
}

fn validate(template: &Template) -> ApiResult<()> {
    if template.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    if template.investment_type.trim().is_empty() {
        return Err(ApiError::BadRequest("investment_type is required".to_string()));
    }
    if template.default_amount.is_some_and(|a| !(a.is_finite() && a > 0.0)) {
        return Err(ApiError::BadRequest(
            "default_amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

async fn load(state: &AppState, id: Uuid) -> ApiResult<Template> {
    db::templates::get_template(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Template {}", id)))
}

/// GET /api/templates
pub async fn list_templates(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> ApiResult<Json<Vec<Template>>> {
    Ok(Json(db::templates::list_templates(&state.db).await?))
}

/// POST /api/templates
pub async fn create_template(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<TemplateBody>,
) -> ApiResult<(StatusCode, Json<Template>)> {
    require_role(&user, Role::Manager)?;

    let created = now();
    let template = Template {
        id: Uuid::new_v4(),
        name: body.name.unwrap_or_default().trim().to_string(),
        investment_type: body.investment_type.unwrap_or_default().trim().to_string(),
        description: body.description.unwrap_or_default(),
        default_amount: body.default_amount,
        default_currency: body
            .default_currency
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.trim().to_ascii_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        default_risk_level: body.default_risk_level,
        created_by: user.id,
        created_at: created,
        updated_at: created,
    };
    validate(&template)?;

    db::templates::insert_template(&state.db, &template).await?;
    info!(template = %template.name, by = %user.username, "Template created");
    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /api/templates/:id
pub async fn get_template(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Template>> {
    Ok(Json(load(&state, id).await?))
}

/// PUT /api/templates/:id
pub async fn update_template(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<TemplateBody>,
) -> ApiResult<Json<Template>> {
    require_role(&user, Role::Manager)?;
    let mut template = load(&state, id).await?;

    if let Some(name) = body.name {
        template.name = name.trim().to_string();
    }
    if let Some(investment_type) = body.investment_type {
        template.investment_type = investment_type.trim().to_string();
    }
    if let Some(description) = body.description {
        template.description = description;
    }
    if body.default_amount.is_some() {
        template.default_amount = body.default_amount;
    }
    if let Some(currency) = body.default_currency.filter(|c| !c.trim().is_empty()) {
        template.default_currency = currency.trim().to_ascii_uppercase();
    }
    if body.default_risk_level.is_some() {
        template.default_risk_level = body.default_risk_level;
    }
    validate(&template)?;
    template.updated_at = now();

    db::templates::update_template(&state.db, &template).await?;
    Ok(Json(template))
}

/// DELETE /api/templates/:id
pub async fn delete_template(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_role(&user, Role::Manager)?;
    if !db::templates::soft_delete_template(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Template {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn template_routes() -> Router<AppState> {
    Router::new()
        .route("/api/templates", get(list_templates).post(create_template))
        .route(
            "/api/templates/:id",
            get(get_template).put(update_template).delete(delete_template),
        )
}
