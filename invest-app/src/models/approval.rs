//! Approval stages and recorded decisions

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{RequestStatus, Role};

string_enum! {
    pub enum ApprovalStage {
        Manager => "manager",
        Committee => "committee",
        Finance => "finance",
    }
}

impl ApprovalStage {
    /// Role that decides at this stage
    pub fn role(&self) -> Role {
        match self {
            ApprovalStage::Manager => Role::Manager,
            ApprovalStage::Committee => Role::CommitteeMember,
            ApprovalStage::Finance => Role::Finance,
        }
    }

    pub fn next(&self) -> Option<ApprovalStage> {
        match self {
            ApprovalStage::Manager => Some(ApprovalStage::Committee),
            ApprovalStage::Committee => Some(ApprovalStage::Finance),
            ApprovalStage::Finance => None,
        }
    }

    /// Request status once this stage approves
    pub fn approved_status(&self) -> RequestStatus {
        match self {
            ApprovalStage::Manager => RequestStatus::ManagerApproved,
            ApprovalStage::Committee => RequestStatus::CommitteeApproved,
            ApprovalStage::Finance => RequestStatus::Approved,
        }
    }

    /// Stage awaiting a decision for a request in `status`
    pub fn pending_for(status: RequestStatus) -> Option<ApprovalStage> {
        match status {
            RequestStatus::New => Some(ApprovalStage::Manager),
            RequestStatus::ManagerApproved => Some(ApprovalStage::Committee),
            RequestStatus::CommitteeApproved => Some(ApprovalStage::Finance),
            _ => None,
        }
    }
}

string_enum! {
    pub enum Decision {
        Approved => "approved",
        Rejected => "rejected",
        ChangesRequested => "changes_requested",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Approval {
    pub id: Uuid,
    pub request_id: Uuid,
    pub stage: ApprovalStage,
    pub approver_id: Uuid,
    pub approver_name: String,
    pub decision: Decision,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
}
