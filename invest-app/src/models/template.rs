//! Reusable defaults for new investment requests

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::RiskLevel;

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub investment_type: String,
    pub description: String,
    pub default_amount: Option<f64>,
    pub default_currency: String,
    pub default_risk_level: Option<RiskLevel>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
