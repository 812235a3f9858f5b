//! Work items routed to a role or a specific user

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{ApprovalStage, Role};

string_enum! {
    pub enum TaskType {
        /// Decide at an approval stage
        Approval => "approval",
        /// Requester must revise and resubmit
        Revision => "revision",
    }
}

string_enum! {
    pub enum TaskStatus {
        Pending => "pending",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub request_id: Uuid,
    pub request_code: String,
    pub request_title: String,
    pub task_type: TaskType,
    pub stage: Option<ApprovalStage>,
    pub assignee_role: Role,
    pub assignee_id: Option<Uuid>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
}
