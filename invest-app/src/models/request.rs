//! Investment requests and their workflow status

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

string_enum! {
    pub enum RequestStatus {
        Draft => "draft",
        /// Submitted, awaiting the manager
        New => "new",
        ManagerApproved => "manager_approved",
        CommitteeApproved => "committee_approved",
        Approved => "approved",
        Rejected => "rejected",
        ChangesRequested => "changes_requested",
    }
}

impl RequestStatus {
    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }

    /// The requester may edit and (re)submit
    pub fn is_editable(&self) -> bool {
        matches!(self, RequestStatus::Draft | RequestStatus::ChangesRequested)
    }
}

string_enum! {
    pub enum RiskLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestmentRequest {
    pub id: Uuid,
    /// Human-readable code, `INV-<year>-<seq>`
    pub request_code: String,
    pub title: String,
    pub description: String,
    pub investment_type: String,
    pub amount: f64,
    pub currency: String,
    pub expected_return: Option<f64>,
    pub risk_level: RiskLevel,
    pub status: RequestStatus,
    pub requester_id: Uuid,
    pub template_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_and_editable() {
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(!RequestStatus::ChangesRequested.is_terminal());
        assert!(RequestStatus::Draft.is_editable());
        assert!(RequestStatus::ChangesRequested.is_editable());
        assert!(!RequestStatus::New.is_editable());
    }
}
