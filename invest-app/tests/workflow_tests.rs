//! Approval workflow tests
//!
//! Drives requests through role-based actions against an in-memory database
//! and checks status, tasks, approvals, notifications and events.

mod helpers;

use helpers::{create_request, create_test_db, create_user};
use invest_app::db;
use invest_app::models::{
    ApprovalStage, Decision, RequestStatus, Role, TaskStatus, TaskType, User,
};
use invest_app::services::{ServiceError, WorkflowService};
use invest_common::events::{EventBus, InvestEvent};
use sqlx::SqlitePool;

struct Team {
    analyst: User,
    manager: User,
    committee: User,
    finance: User,
    admin: User,
}

async fn setup() -> (SqlitePool, EventBus, WorkflowService, Team) {
    let pool = create_test_db().await;
    let bus = EventBus::new(64);
    let workflow = WorkflowService::new(pool.clone(), bus.clone());

    let team = Team {
        analyst: create_user(&pool, "alex", Role::Analyst).await,
        manager: create_user(&pool, "morgan", Role::Manager).await,
        committee: create_user(&pool, "casey", Role::CommitteeMember).await,
        finance: create_user(&pool, "fran", Role::Finance).await,
        admin: create_user(&pool, "ada", Role::Admin).await,
    };

    (pool, bus, workflow, team)
}

fn pending(tasks: &[invest_app::models::Task]) -> Vec<(TaskType, Option<ApprovalStage>, Role)> {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .map(|t| (t.task_type, t.stage, t.assignee_role))
        .collect()
}

#[tokio::test]
async fn happy_path_reaches_approved() {
    let (pool, bus, workflow, team) = setup().await;
    let mut events = bus.subscribe();
    let request = create_request(&pool, &team.analyst, "Acme Series B").await;

    let submitted = workflow.submit(request.id, &team.analyst).await.unwrap();
    assert_eq!(submitted.status, RequestStatus::New);
    assert!(submitted.submitted_at.is_some());

    let tasks = db::tasks::list_tasks_for_request(&pool, request.id).await.unwrap();
    assert_eq!(
        pending(&tasks),
        vec![(TaskType::Approval, Some(ApprovalStage::Manager), Role::Manager)]
    );

    let after_manager = workflow
        .approve(request.id, &team.manager, Some("Solid thesis".into()))
        .await
        .unwrap();
    assert_eq!(after_manager.status, RequestStatus::ManagerApproved);

    let after_committee = workflow.approve(request.id, &team.committee, None).await.unwrap();
    assert_eq!(after_committee.status, RequestStatus::CommitteeApproved);
    assert!(after_committee.decided_at.is_none());

    let approved = workflow.approve(request.id, &team.finance, None).await.unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert!(approved.decided_at.is_some());
    assert!(approved.status.is_terminal());

    let approvals = db::approvals::list_approvals(&pool, request.id).await.unwrap();
    let stages: Vec<_> = approvals.iter().map(|a| (a.stage, a.decision)).collect();
    assert_eq!(
        stages,
        vec![
            (ApprovalStage::Manager, Decision::Approved),
            (ApprovalStage::Committee, Decision::Approved),
            (ApprovalStage::Finance, Decision::Approved),
        ]
    );
    assert_eq!(approvals[0].comments.as_deref(), Some("Solid thesis"));
    assert_eq!(approvals[0].approver_name, team.manager.display_name);

    let tasks = db::tasks::list_tasks_for_request(&pool, request.id).await.unwrap();
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));

    // Each reviewer role was notified once; the requester got the final decision
    for user in [&team.manager, &team.committee, &team.finance, &team.analyst] {
        let notes = db::notifications::list_notifications(&pool, user.id, false).await.unwrap();
        assert_eq!(notes.len(), 1, "{}", user.username);
    }
    let requester_notes = db::notifications::list_notifications(&pool, team.analyst.id, false)
        .await
        .unwrap();
    assert_eq!(requester_notes[0].kind, "request_approved");

    let mut transitions = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let InvestEvent::RequestStatusChanged { old_status, new_status, .. } = event {
            transitions.push((old_status, new_status));
        }
    }
    assert_eq!(
        transitions,
        vec![
            ("draft".to_string(), "new".to_string()),
            ("new".to_string(), "manager_approved".to_string()),
            ("manager_approved".to_string(), "committee_approved".to_string()),
            ("committee_approved".to_string(), "approved".to_string()),
        ]
    );
}

#[tokio::test]
async fn rejection_is_terminal_and_cancels_tasks() {
    let (pool, _bus, workflow, team) = setup().await;
    let request = create_request(&pool, &team.analyst, "Risky bet").await;
    workflow.submit(request.id, &team.analyst).await.unwrap();
    workflow.approve(request.id, &team.manager, None).await.unwrap();

    let err = workflow.reject(request.id, &team.committee, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let rejected = workflow
        .reject(request.id, &team.committee, Some("Too concentrated".into()))
        .await
        .unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert!(rejected.decided_at.is_some());

    let tasks = db::tasks::list_tasks_for_request(&pool, request.id).await.unwrap();
    assert!(pending(&tasks).is_empty());
    assert!(tasks.iter().any(|t| t.status == TaskStatus::Cancelled));

    let approvals = db::approvals::list_approvals(&pool, request.id).await.unwrap();
    let last = approvals.last().unwrap();
    assert_eq!((last.stage, last.decision), (ApprovalStage::Committee, Decision::Rejected));

    let notes = db::notifications::list_notifications(&pool, team.analyst.id, false).await.unwrap();
    assert_eq!(notes[0].kind, "request_rejected");
    assert!(notes[0].message.contains("Too concentrated"));

    // Terminal: nothing else applies
    let err = workflow.approve(request.id, &team.finance, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    let err = workflow.submit(request.id, &team.analyst).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn changes_requested_then_resubmitted() {
    let (pool, _bus, workflow, team) = setup().await;
    let request = create_request(&pool, &team.analyst, "Needs work").await;
    workflow.submit(request.id, &team.analyst).await.unwrap();

    let returned = workflow
        .request_changes(request.id, &team.manager, Some("Add a downside case".into()))
        .await
        .unwrap();
    assert_eq!(returned.status, RequestStatus::ChangesRequested);

    let tasks = db::tasks::list_tasks_for_request(&pool, request.id).await.unwrap();
    let revision: Vec<_> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .collect();
    assert_eq!(revision.len(), 1);
    assert_eq!(revision[0].task_type, TaskType::Revision);
    assert_eq!(revision[0].assignee_id, Some(team.analyst.id));
    assert_eq!(revision[0].assignee_role, Role::Analyst);

    // The analyst's inbox holds the revision task
    let inbox = db::tasks::list_tasks_for_user(&pool, &team.analyst, Some(TaskStatus::Pending))
        .await
        .unwrap();
    assert_eq!(inbox.len(), 1);

    let resubmitted = workflow.submit(request.id, &team.analyst).await.unwrap();
    assert_eq!(resubmitted.status, RequestStatus::New);

    let tasks = db::tasks::list_tasks_for_request(&pool, request.id).await.unwrap();
    assert_eq!(
        pending(&tasks),
        vec![(TaskType::Approval, Some(ApprovalStage::Manager), Role::Manager)]
    );
    assert!(tasks
        .iter()
        .any(|t| t.task_type == TaskType::Revision && t.status == TaskStatus::Cancelled));

    let approved = workflow.approve(request.id, &team.manager, None).await.unwrap();
    assert_eq!(approved.status, RequestStatus::ManagerApproved);
}

#[tokio::test]
async fn wrong_role_is_forbidden() {
    let (pool, _bus, workflow, team) = setup().await;
    let request = create_request(&pool, &team.analyst, "Role check").await;

    let err = workflow.submit(request.id, &team.manager).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    workflow.submit(request.id, &team.analyst).await.unwrap();

    for actor in [&team.analyst, &team.committee, &team.finance] {
        let err = workflow.approve(request.id, actor, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)), "{}", actor.username);
    }
    let err = workflow
        .reject(request.id, &team.finance, Some("no".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let unchanged = db::requests::get_request(&pool, request.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, RequestStatus::New);
    assert!(db::approvals::list_approvals(&pool, request.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn wrong_state_is_conflict() {
    let (pool, _bus, workflow, team) = setup().await;
    let request = create_request(&pool, &team.analyst, "State check").await;

    // Drafts are not under review
    let err = workflow.approve(request.id, &team.manager, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    let err = workflow
        .request_changes(request.id, &team.manager, Some("?".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    workflow.submit(request.id, &team.analyst).await.unwrap();
    let err = workflow.submit(request.id, &team.analyst).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn admin_may_act_at_any_stage() {
    let (pool, _bus, workflow, team) = setup().await;
    let request = create_request(&pool, &team.analyst, "Admin override").await;
    workflow.submit(request.id, &team.analyst).await.unwrap();

    for expected in [
        RequestStatus::ManagerApproved,
        RequestStatus::CommitteeApproved,
        RequestStatus::Approved,
    ] {
        let updated = workflow.approve(request.id, &team.admin, None).await.unwrap();
        assert_eq!(updated.status, expected);
    }
}

#[tokio::test]
async fn missing_request_is_not_found() {
    let (_pool, _bus, workflow, team) = setup().await;
    let err = workflow
        .submit(uuid::Uuid::new_v4(), &team.analyst)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn inactive_reviewers_are_not_notified() {
    let (pool, _bus, workflow, team) = setup().await;
    let mut retired = create_user(&pool, "retired", Role::Manager).await;
    retired.active = false;
    db::users::update_user(&pool, &retired).await.unwrap();

    let request = create_request(&pool, &team.analyst, "Notify check").await;
    workflow.submit(request.id, &team.analyst).await.unwrap();

    assert_eq!(db::notifications::unread_count(&pool, team.manager.id).await.unwrap(), 1);
    assert_eq!(db::notifications::unread_count(&pool, retired.id).await.unwrap(), 0);
}

#[tokio::test]
async fn stale_edit_and_delete_lose_to_submit() {
    let (pool, _bus, workflow, team) = setup().await;
    let request = create_request(&pool, &team.analyst, "Original terms").await;

    // Read for editing, then submitted before the write lands
    let mut stale = db::requests::get_request(&pool, request.id).await.unwrap().unwrap();
    workflow.submit(request.id, &team.analyst).await.unwrap();

    stale.title = "Changed terms".into();
    stale.amount = 9_000_000.0;
    assert!(!db::requests::update_request(&pool, &stale).await.unwrap());
    assert!(!db::requests::soft_delete_request(&pool, request.id).await.unwrap());

    let current = db::requests::get_request(&pool, request.id).await.unwrap().unwrap();
    assert_eq!(current.status, RequestStatus::New);
    assert_eq!(current.title, "Original terms");
    assert_eq!(current.amount, 250_000.0);

    // Back in the requester's hands, both succeed again
    workflow
        .request_changes(request.id, &team.manager, Some("Tighten terms".into()))
        .await
        .unwrap();
    let mut editable = db::requests::get_request(&pool, request.id).await.unwrap().unwrap();
    editable.title = "Revised terms".into();
    assert!(db::requests::update_request(&pool, &editable).await.unwrap());
    assert!(db::requests::soft_delete_request(&pool, request.id).await.unwrap());
    assert!(db::requests::get_request(&pool, request.id).await.unwrap().is_none());
}
