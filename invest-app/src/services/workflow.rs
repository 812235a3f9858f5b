//! Approval workflow
//!
//! A request moves `draft → new → manager_approved → committee_approved →
//! approved`, leaving the line through `rejected` (terminal) or
//! `changes_requested` (back to the requester, then resubmitted as `new`).
//!
//! Every action is one transaction: re-read the request, check state and
//! role, move it with a conditional status update, then adjust tasks and
//! write notifications. Events are emitted after the commit.

use chrono::{DateTime, Utc};
use invest_common::events::{EventBus, InvestEvent};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::info;
use uuid::Uuid;

use super::notifier::{self, Message};
use super::{ServiceError, ServiceResult};
use crate::db::{self, now};
use crate::models::{
    Approval, ApprovalStage, Decision, InvestmentRequest, Notification, RequestStatus, Role, Task,
    TaskStatus, TaskType, User,
};

/// Effects of a committed transition, announced on the event bus
struct Transition {
    request: InvestmentRequest,
    old_status: RequestStatus,
    new_status: RequestStatus,
    actor_id: Uuid,
    at: DateTime<Utc>,
    tasks: Vec<Task>,
    notifications: Vec<Notification>,
}

#[derive(Debug, Clone)]
pub struct WorkflowService {
    db: SqlitePool,
    event_bus: EventBus,
}

impl WorkflowService {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }

    /// Send a draft (or a revised request) to manager review
    pub async fn submit(&self, request_id: Uuid, actor: &User) -> ServiceResult<InvestmentRequest> {
        let mut tx = self.db.begin().await?;
        let request = load_request(&mut tx, request_id).await?;

        if request.requester_id != actor.id && !actor.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only the requester can submit a request".to_string(),
            ));
        }
        if !request.status.is_editable() {
            return Err(ServiceError::Conflict(format!(
                "Request {} cannot be submitted while '{}'",
                request.request_code, request.status
            )));
        }

        let at = now();
        move_status(&mut tx, &request, RequestStatus::New, Some(at), None).await?;
        db::tasks::cancel_open_tasks(&mut tx, request.id, Some(TaskType::Revision)).await?;

        let task = approval_task(&request, ApprovalStage::Manager, at);
        db::tasks::insert_task(&mut *tx, &task).await?;
        let notifications =
            notifier::notify_role(&mut tx, Role::Manager, &approval_required(&request, ApprovalStage::Manager))
                .await?;

        tx.commit().await?;

        self.finish(Transition {
            old_status: request.status,
            request,
            new_status: RequestStatus::New,
            actor_id: actor.id,
            at,
            tasks: vec![task],
            notifications,
        })
        .await
    }

    /// Approve at the pending stage; finance approval is final
    pub async fn approve(
        &self,
        request_id: Uuid,
        actor: &User,
        comments: Option<String>,
    ) -> ServiceResult<InvestmentRequest> {
        let (mut tx, request, stage) = self.begin_review(request_id, actor, "approve").await?;
        let at = now();
        let new_status = stage.approved_status();
        let decided_at = stage.next().is_none().then_some(at);

        move_status(&mut tx, &request, new_status, None, decided_at).await?;
        record_decision(&mut tx, &request, stage, actor, Decision::Approved, comments, at).await?;
        db::tasks::complete_open_tasks(&mut tx, request.id, TaskType::Approval, actor.id).await?;

        let mut tasks = Vec::new();
        let notifications = match stage.next() {
            Some(next) => {
                let task = approval_task(&request, next, at);
                db::tasks::insert_task(&mut *tx, &task).await?;
                tasks.push(task);
                notifier::notify_role(&mut tx, next.role(), &approval_required(&request, next)).await?
            }
            None => {
                let message = Message {
                    kind: notifier::REQUEST_APPROVED,
                    title: format!("{} approved", request.request_code),
                    message: format!("\"{}\" has received final approval.", request.title),
                    request_id: Some(request.id),
                };
                vec![notifier::notify_user(&mut tx, request.requester_id, &message).await?]
            }
        };

        tx.commit().await?;

        self.finish(Transition {
            old_status: request.status,
            request,
            new_status,
            actor_id: actor.id,
            at,
            tasks,
            notifications,
        })
        .await
    }

    pub async fn reject(
        &self,
        request_id: Uuid,
        actor: &User,
        comments: Option<String>,
    ) -> ServiceResult<InvestmentRequest> {
        let comments = required_comments(comments, "rejecting")?;
        let (mut tx, request, stage) = self.begin_review(request_id, actor, "reject").await?;
        let at = now();

        move_status(&mut tx, &request, RequestStatus::Rejected, None, Some(at)).await?;
        record_decision(&mut tx, &request, stage, actor, Decision::Rejected, Some(comments.clone()), at).await?;
        db::tasks::cancel_open_tasks(&mut tx, request.id, None).await?;

        let message = Message {
            kind: notifier::REQUEST_REJECTED,
            title: format!("{} rejected", request.request_code),
            message: format!("\"{}\" was rejected at {} review: {}", request.title, stage, comments),
            request_id: Some(request.id),
        };
        let notifications = vec![notifier::notify_user(&mut tx, request.requester_id, &message).await?];

        tx.commit().await?;

        self.finish(Transition {
            old_status: request.status,
            request,
            new_status: RequestStatus::Rejected,
            actor_id: actor.id,
            at,
            tasks: Vec::new(),
            notifications,
        })
        .await
    }

    /// Return the request to its requester with a revision task
    pub async fn request_changes(
        &self,
        request_id: Uuid,
        actor: &User,
        comments: Option<String>,
    ) -> ServiceResult<InvestmentRequest> {
        let comments = required_comments(comments, "requesting changes")?;
        let (mut tx, request, stage) = self.begin_review(request_id, actor, "request changes on").await?;
        let at = now();

        let requester = db::users::get_user(&mut *tx, request.requester_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {}", request.requester_id)))?;

        move_status(&mut tx, &request, RequestStatus::ChangesRequested, None, None).await?;
        record_decision(
            &mut tx,
            &request,
            stage,
            actor,
            Decision::ChangesRequested,
            Some(comments.clone()),
            at,
        )
        .await?;
        db::tasks::cancel_open_tasks(&mut tx, request.id, Some(TaskType::Approval)).await?;

        let task = Task {
            id: Uuid::new_v4(),
            request_id: request.id,
            request_code: request.request_code.clone(),
            request_title: request.title.clone(),
            task_type: TaskType::Revision,
            stage: None,
            assignee_role: requester.role,
            assignee_id: Some(requester.id),
            status: TaskStatus::Pending,
            created_at: at,
            completed_at: None,
            completed_by: None,
        };
        db::tasks::insert_task(&mut *tx, &task).await?;

        let message = Message {
            kind: notifier::CHANGES_REQUESTED,
            title: format!("Changes requested on {}", request.request_code),
            message: format!("{} review asked for changes to \"{}\": {}", stage, request.title, comments),
            request_id: Some(request.id),
        };
        let notifications = vec![notifier::notify_user(&mut tx, requester.id, &message).await?];

        tx.commit().await?;

        self.finish(Transition {
            old_status: request.status,
            request,
            new_status: RequestStatus::ChangesRequested,
            actor_id: actor.id,
            at,
            tasks: vec![task],
            notifications,
        })
        .await
    }

    /// Open a transaction on a request under review and check the actor may decide it
    async fn begin_review(
        &self,
        request_id: Uuid,
        actor: &User,
        action: &str,
    ) -> ServiceResult<(Transaction<'static, Sqlite>, InvestmentRequest, ApprovalStage)> {
        let mut tx = self.db.begin().await?;
        let request = load_request(&mut tx, request_id).await?;

        let stage = ApprovalStage::pending_for(request.status).ok_or_else(|| {
            ServiceError::Conflict(format!(
                "Cannot {} request {} while '{}'",
                action, request.request_code, request.status
            ))
        })?;

        if !actor.has_role(stage.role()) {
            return Err(ServiceError::Forbidden(format!(
                "Request {} is awaiting {} review; role '{}' cannot {} it",
                request.request_code, stage, actor.role, action
            )));
        }

        Ok((tx, request, stage))
    }

    async fn finish(&self, transition: Transition) -> ServiceResult<InvestmentRequest> {
        let Transition {
            request,
            old_status,
            new_status,
            actor_id,
            at,
            tasks,
            notifications,
        } = transition;

        info!(
            request = %request.request_code,
            from = %old_status,
            to = %new_status,
            actor = %actor_id,
            "Request status changed"
        );

        self.event_bus.emit_lossy(InvestEvent::RequestStatusChanged {
            request_id: request.id,
            request_code: request.request_code.clone(),
            old_status: old_status.to_string(),
            new_status: new_status.to_string(),
            actor_id,
            timestamp: at,
        });
        for task in &tasks {
            self.event_bus.emit_lossy(InvestEvent::TaskAssigned {
                task_id: task.id,
                request_id: task.request_id,
                task_type: task.task_type.to_string(),
                assignee_role: task.assignee_role.to_string(),
                assignee_id: task.assignee_id,
                timestamp: task.created_at,
            });
        }
        notifier::announce(&self.event_bus, &notifications);

        db::requests::get_request(&self.db, request.id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Request {}", request.id)))
    }
}

async fn load_request(conn: &mut SqliteConnection, request_id: Uuid) -> ServiceResult<InvestmentRequest> {
    db::requests::get_request(&mut *conn, request_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Request {}", request_id)))
}

async fn move_status(
    conn: &mut SqliteConnection,
    request: &InvestmentRequest,
    status: RequestStatus,
    submitted_at: Option<DateTime<Utc>>,
    decided_at: Option<DateTime<Utc>>,
) -> ServiceResult<()> {
    let moved =
        db::requests::transition_status(conn, request.id, request.status, status, submitted_at, decided_at)
            .await?;
    if !moved {
        return Err(ServiceError::Conflict(format!(
            "Request {} changed status concurrently",
            request.request_code
        )));
    }
    Ok(())
}

async fn record_decision(
    conn: &mut SqliteConnection,
    request: &InvestmentRequest,
    stage: ApprovalStage,
    actor: &User,
    decision: Decision,
    comments: Option<String>,
    at: DateTime<Utc>,
) -> ServiceResult<()> {
    let approval = Approval {
        id: Uuid::new_v4(),
        request_id: request.id,
        stage,
        approver_id: actor.id,
        approver_name: actor.display_name.clone(),
        decision,
        comments: comments.filter(|c| !c.trim().is_empty()),
        created_at: at,
    };
    db::approvals::insert_approval(&mut *conn, &approval).await?;
    Ok(())
}

fn approval_task(request: &InvestmentRequest, stage: ApprovalStage, at: DateTime<Utc>) -> Task {
    Task {
        id: Uuid::new_v4(),
        request_id: request.id,
        request_code: request.request_code.clone(),
        request_title: request.title.clone(),
        task_type: TaskType::Approval,
        stage: Some(stage),
        assignee_role: stage.role(),
        assignee_id: None,
        status: TaskStatus::Pending,
        created_at: at,
        completed_at: None,
        completed_by: None,
    }
}

fn approval_required(request: &InvestmentRequest, stage: ApprovalStage) -> Message {
    Message {
        kind: notifier::APPROVAL_REQUIRED,
        title: format!("Approval required: {}", request.request_code),
        message: format!(
            "\"{}\" ({:.2} {}) is awaiting {} approval.",
            request.title, request.amount, request.currency, stage
        ),
        request_id: Some(request.id),
    }
}

fn required_comments(comments: Option<String>, action: &str) -> ServiceResult<String> {
    comments
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ServiceError::InvalidInput(format!("Comments are required when {}", action)))
}
