//! Background job processor tests
//!
//! Runs the analysis pipeline against a scripted intelligence backend so
//! step ordering, resumption and the attempt budget can be observed.

mod helpers;

use helpers::intelligence::{ATTACH, INSIGHTS, SUMMARIZE, UPLOAD};
use helpers::{create_request, create_test_db, create_user, upload_document, ScriptedIntelligence};
use invest_app::db;
use invest_app::models::{AnalysisStatus, JobStatus, JobStep, Role};
use invest_app::services::{JobOutcome, JobProcessor};
use invest_common::events::{EventBus, InvestEvent};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

fn processor(pool: &sqlx::SqlitePool, bus: &EventBus, intelligence: Arc<ScriptedIntelligence>) -> JobProcessor {
    JobProcessor::new(pool.clone(), bus.clone(), intelligence, Arc::new(Notify::new()))
}

#[tokio::test]
async fn empty_queue_yields_nothing() {
    let pool = create_test_db().await;
    let bus = EventBus::new(16);
    let scripted = Arc::new(ScriptedIntelligence::new());

    let outcome = processor(&pool, &bus, scripted.clone()).process_next().await.unwrap();
    assert_eq!(outcome, None);
    assert!(scripted.calls().is_empty());
}

#[tokio::test]
async fn job_runs_every_step_once() {
    let pool = create_test_db().await;
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let dir = TempDir::new().unwrap();
    let analyst = create_user(&pool, "alex", Role::Analyst).await;
    let request = create_request(&pool, &analyst, "Acme").await;
    let (document, job) = upload_document(&pool, dir.path(), &request, &analyst, "deck.pdf", b"%PDF", 3).await;

    let scripted = Arc::new(ScriptedIntelligence::new());
    let outcome = processor(&pool, &bus, scripted.clone()).process_next().await.unwrap();
    assert_eq!(outcome, Some(JobOutcome::Completed(job.id)));

    assert_eq!(scripted.calls(), vec![UPLOAD, ATTACH, SUMMARIZE, INSIGHTS]);

    let job = db::jobs::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.current_step, JobStep::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.attempts, 0);
    assert!(job.completed_at.is_some());

    let document = db::documents::get_document(&pool, document.id).await.unwrap().unwrap();
    assert_eq!(document.analysis_status, AnalysisStatus::Completed);
    assert_eq!(document.openai_file_id.as_deref(), Some("file-deck.pdf"));
    assert_eq!(document.vector_store_file_id.as_deref(), Some("vsf-file-deck.pdf"));
    assert_eq!(document.summary.as_deref(), Some("Summary of file-deck.pdf"));
    assert_eq!(document.insights.as_deref(), Some("general insights for file-deck.pdf"));

    let attributes = &scripted.attached_attributes()[0];
    assert_eq!(attributes["request_code"], request.request_code.as_str());
    assert_eq!(attributes["investment_type"], "venture");
    assert_eq!(attributes["document_id"], document.id.to_string().as_str());
    assert_eq!(document.metadata.as_ref().unwrap()["request_id"], request.id.to_string().as_str());

    let notes = db::notifications::list_notifications(&pool, analyst.id, false).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, "analysis_completed");

    let mut progress = Vec::new();
    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            InvestEvent::JobProgress { progress: p, .. } => progress.push(p),
            InvestEvent::JobCompleted { job_id, .. } => completed = job_id == job.id,
            _ => {}
        }
    }
    assert_eq!(progress, vec![10, 35, 60, 85, 100]);
    assert!(completed);
}

#[tokio::test]
async fn vector_store_attributes_include_filename_metadata() {
    let pool = create_test_db().await;
    let bus = EventBus::new(64);
    let dir = TempDir::new().unwrap();
    let analyst = create_user(&pool, "alex", Role::Analyst).await;
    let request = create_request(&pool, &analyst, "Acme").await;
    let (document, _) = upload_document(
        &pool,
        dir.path(),
        &request,
        &analyst,
        "Acme Corp Annual Report 2023.pdf",
        b"%PDF",
        3,
    )
    .await;

    let scripted = Arc::new(ScriptedIntelligence::new());
    processor(&pool, &bus, scripted.clone()).process_next().await.unwrap();

    let attributes = &scripted.attached_attributes()[0];
    assert_eq!(attributes["year"], "2023");
    assert_eq!(attributes["document_type"], "annual report");
    assert_eq!(attributes["file_extension"], ".pdf");
    assert!(attributes.contains_key("extraction_confidence"));
    assert_eq!(attributes["request_code"], request.request_code.as_str());

    let document = db::documents::get_document(&pool, document.id).await.unwrap().unwrap();
    let metadata = document.metadata.unwrap();
    assert_eq!(metadata["year"], "2023");
    assert_eq!(metadata["document_type"], "annual report");
    assert_eq!(metadata["request_id"], request.id.to_string().as_str());
}

#[tokio::test]
async fn retry_resumes_at_failed_step() {
    let pool = create_test_db().await;
    let bus = EventBus::new(64);
    let dir = TempDir::new().unwrap();
    let analyst = create_user(&pool, "alex", Role::Analyst).await;
    let request = create_request(&pool, &analyst, "Acme").await;
    let (document, job) = upload_document(&pool, dir.path(), &request, &analyst, "model.xlsx", b"cells", 3).await;

    let scripted = Arc::new(ScriptedIntelligence::failing(SUMMARIZE, 1));
    let worker = processor(&pool, &bus, scripted.clone());

    let first = worker.process_next().await.unwrap();
    assert_eq!(first, Some(JobOutcome::Retrying(job.id)));

    let pending = db::jobs::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(pending.status, JobStatus::Pending);
    assert_eq!(pending.current_step, JobStep::Summarizing);
    assert_eq!(pending.attempts, 1);
    assert!(pending.last_error.as_deref().unwrap().contains("summarize_document exploded"));

    let second = worker.process_next().await.unwrap();
    assert_eq!(second, Some(JobOutcome::Completed(job.id)));

    assert_eq!(scripted.count(UPLOAD), 1);
    assert_eq!(scripted.count(ATTACH), 1);
    assert_eq!(scripted.count(SUMMARIZE), 2);
    assert_eq!(scripted.count(INSIGHTS), 1);

    let document = db::documents::get_document(&pool, document.id).await.unwrap().unwrap();
    assert_eq!(document.analysis_status, AnalysisStatus::Completed);
}

#[tokio::test]
async fn job_fails_after_max_attempts() {
    let pool = create_test_db().await;
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let dir = TempDir::new().unwrap();
    let analyst = create_user(&pool, "alex", Role::Analyst).await;
    let request = create_request(&pool, &analyst, "Acme").await;
    let (document, job) = upload_document(&pool, dir.path(), &request, &analyst, "memo.pdf", b"%PDF", 3).await;

    let scripted = Arc::new(ScriptedIntelligence::failing(UPLOAD, usize::MAX));
    let worker = processor(&pool, &bus, scripted.clone());

    assert_eq!(worker.process_next().await.unwrap(), Some(JobOutcome::Retrying(job.id)));
    assert_eq!(worker.process_next().await.unwrap(), Some(JobOutcome::Retrying(job.id)));
    assert_eq!(worker.process_next().await.unwrap(), Some(JobOutcome::Failed(job.id)));
    assert_eq!(worker.process_next().await.unwrap(), None);

    assert_eq!(scripted.count(UPLOAD), 3);
    assert_eq!(scripted.count(ATTACH), 0);

    let failed = db::jobs::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.attempts, 3);
    assert_eq!(failed.current_step, JobStep::Uploading);
    assert!(failed.last_error.is_some());

    let document = db::documents::get_document(&pool, document.id).await.unwrap().unwrap();
    assert_eq!(document.analysis_status, AnalysisStatus::Failed);

    let notes = db::notifications::list_notifications(&pool, analyst.id, false).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, "analysis_failed");

    let mut retries = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let InvestEvent::JobFailed { attempts, will_retry, .. } = event {
            retries.push((attempts, will_retry));
        }
    }
    assert_eq!(retries, vec![(1, true), (2, true), (3, false)]);
}

#[tokio::test]
async fn failed_job_can_be_retried_with_fresh_budget() {
    let pool = create_test_db().await;
    let bus = EventBus::new(64);
    let dir = TempDir::new().unwrap();
    let analyst = create_user(&pool, "alex", Role::Analyst).await;
    let request = create_request(&pool, &analyst, "Acme").await;
    let (_, job) = upload_document(&pool, dir.path(), &request, &analyst, "memo.pdf", b"%PDF", 1).await;

    let scripted = Arc::new(ScriptedIntelligence::failing(INSIGHTS, 1));
    let worker = processor(&pool, &bus, scripted.clone());
    assert_eq!(worker.process_next().await.unwrap(), Some(JobOutcome::Failed(job.id)));

    assert!(db::jobs::retry_failed_job(&pool, job.id).await.unwrap());
    assert!(!db::jobs::retry_failed_job(&pool, job.id).await.unwrap());

    assert_eq!(worker.process_next().await.unwrap(), Some(JobOutcome::Completed(job.id)));
    assert_eq!(scripted.count(UPLOAD), 1);
    assert_eq!(scripted.count(INSIGHTS), 2);
}

#[tokio::test]
async fn deleted_document_fails_without_retry() {
    let pool = create_test_db().await;
    let bus = EventBus::new(64);
    let dir = TempDir::new().unwrap();
    let analyst = create_user(&pool, "alex", Role::Analyst).await;
    let request = create_request(&pool, &analyst, "Acme").await;
    let (document, job) = upload_document(&pool, dir.path(), &request, &analyst, "memo.pdf", b"%PDF", 3).await;
    db::documents::soft_delete_document(&pool, document.id).await.unwrap();

    let scripted = Arc::new(ScriptedIntelligence::new());
    let outcome = processor(&pool, &bus, scripted.clone()).process_next().await.unwrap();
    assert_eq!(outcome, Some(JobOutcome::Failed(job.id)));
    assert!(scripted.calls().is_empty());

    let failed = db::jobs::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.attempts, 1);
    assert!(db::notifications::list_notifications(&pool, analyst.id, false)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn jobs_run_oldest_first() {
    let pool = create_test_db().await;
    let bus = EventBus::new(64);
    let dir = TempDir::new().unwrap();
    let analyst = create_user(&pool, "alex", Role::Analyst).await;
    let request = create_request(&pool, &analyst, "Acme").await;
    let (_, first) = upload_document(&pool, dir.path(), &request, &analyst, "a.pdf", b"a", 3).await;
    let (_, second) = upload_document(&pool, dir.path(), &request, &analyst, "b.pdf", b"b", 3).await;

    let worker = processor(&pool, &bus, Arc::new(ScriptedIntelligence::new()));
    assert_eq!(worker.process_next().await.unwrap(), Some(JobOutcome::Completed(first.id)));
    assert_eq!(worker.process_next().await.unwrap(), Some(JobOutcome::Completed(second.id)));
}

#[tokio::test]
async fn storage_error_after_claim_returns_job_to_queue() {
    let pool = create_test_db().await;
    let bus = EventBus::new(64);
    let dir = TempDir::new().unwrap();
    let analyst = create_user(&pool, "alex", Role::Analyst).await;
    let request = create_request(&pool, &analyst, "Acme").await;
    let (_, job) = upload_document(&pool, dir.path(), &request, &analyst, "memo.pdf", b"%PDF", 3).await;

    sqlx::query(
        "CREATE TRIGGER reject_completion BEFORE UPDATE OF status ON background_jobs \
         WHEN NEW.status = 'completed' BEGIN SELECT RAISE(ABORT, 'write rejected'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let scripted = Arc::new(ScriptedIntelligence::new());
    let worker = processor(&pool, &bus, scripted.clone());
    assert!(worker.process_next().await.is_err());

    let released = db::jobs::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(released.status, JobStatus::Pending);
    assert_eq!(released.attempts, 0);
    assert_eq!(released.current_step, JobStep::GeneratingInsights);

    sqlx::query("DROP TRIGGER reject_completion").execute(&pool).await.unwrap();

    assert_eq!(worker.process_next().await.unwrap(), Some(JobOutcome::Completed(job.id)));
    assert_eq!(scripted.count(UPLOAD), 1);
    assert_eq!(scripted.count(INSIGHTS), 2);
}

#[tokio::test]
async fn interrupted_jobs_return_to_queue() {
    let pool = create_test_db().await;
    let dir = TempDir::new().unwrap();
    let analyst = create_user(&pool, "alex", Role::Analyst).await;
    let request = create_request(&pool, &analyst, "Acme").await;
    let (_, job) = upload_document(&pool, dir.path(), &request, &analyst, "memo.pdf", b"%PDF", 3).await;

    // Claimed by a worker that then died
    let claimed = db::jobs::claim_next_job(&pool).await.unwrap().unwrap();
    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.status, JobStatus::Processing);
    assert!(db::jobs::claim_next_job(&pool).await.unwrap().is_none());

    assert_eq!(db::jobs::recover_interrupted_jobs(&pool).await.unwrap(), 1);
    let recovered = db::jobs::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(recovered.status, JobStatus::Pending);
    assert_eq!(recovered.attempts, 0);
}

#[tokio::test]
async fn run_loop_wakes_on_notify_and_stops_on_cancel() {
    let pool = create_test_db().await;
    let bus = EventBus::new(64);
    let dir = TempDir::new().unwrap();
    let analyst = create_user(&pool, "alex", Role::Analyst).await;
    let request = create_request(&pool, &analyst, "Acme").await;

    let wakeup = Arc::new(Notify::new());
    let worker = JobProcessor::new(
        pool.clone(),
        bus.clone(),
        Arc::new(ScriptedIntelligence::new()),
        wakeup.clone(),
    );
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    let (_, job) = upload_document(&pool, dir.path(), &request, &analyst, "memo.pdf", b"%PDF", 3).await;
    wakeup.notify_one();

    let done = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let job = db::jobs::get_job(&pool, job.id).await.unwrap().unwrap();
            if job.status == JobStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(done.is_ok(), "job was not processed after wakeup");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("processor did not stop")
        .unwrap();
}
