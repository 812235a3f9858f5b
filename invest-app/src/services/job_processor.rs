//! Background document analysis
//!
//! One worker drains `background_jobs` oldest first. A job walks
//! `uploading → vectorizing → summarizing → generating_insights`, writing each
//! step's result before advancing `current_step`, so a retried job resumes
//! at the step that failed.

use invest_common::db::settings::get_i64_setting;
use invest_common::events::{EventBus, InvestEvent};
use invest_common::Result;
use invest_llm::metadata::extract_metadata_from_filename;
use invest_llm::prompts::InsightFocus;
use invest_llm::DocumentIntelligence;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::notifier::{self, Message};
use crate::db::{self, now, retry_on_lock, retry::DEFAULT_MAX_LOCK_WAIT_MS};
use crate::models::{AnalysisStatus, BackgroundJob, Document, InvestmentRequest, JobStep, Notification};

pub const DEFAULT_POLL_INTERVAL_SECS: i64 = 15;
pub const MIN_POLL_INTERVAL_SECS: i64 = 10;
pub const MAX_POLL_INTERVAL_SECS: i64 = 30;
pub const DEFAULT_MAX_ATTEMPTS: i64 = 3;

/// Result of processing one claimed job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(Uuid),
    /// Attempt failed; job is pending again at the same step
    Retrying(Uuid),
    /// Attempt budget exhausted, or the document is gone
    Failed(Uuid),
}

/// Why an attempt stopped
#[derive(Debug)]
enum AttemptError {
    /// Counts against the attempt budget
    Retryable(String),
    /// Nothing left to analyze
    Permanent(String),
}

impl AttemptError {
    fn message(&self) -> &str {
        match self {
            AttemptError::Retryable(msg) | AttemptError::Permanent(msg) => msg,
        }
    }
}

impl From<invest_common::Error> for AttemptError {
    fn from(err: invest_common::Error) -> Self {
        AttemptError::Retryable(err.to_string())
    }
}

impl From<invest_llm::LlmError> for AttemptError {
    fn from(err: invest_llm::LlmError) -> Self {
        AttemptError::Retryable(err.to_string())
    }
}

/// Read `job_poll_interval_secs`, clamped to 10-30s
pub async fn poll_interval(pool: &SqlitePool) -> Duration {
    let secs = get_i64_setting(pool, "job_poll_interval_secs", DEFAULT_POLL_INTERVAL_SECS)
        .await
        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
    Duration::from_secs(secs.clamp(MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS) as u64)
}

/// Attempt budget for newly queued jobs (`job_max_attempts`)
pub async fn max_attempts(pool: &SqlitePool) -> u32 {
    get_i64_setting(pool, "job_max_attempts", DEFAULT_MAX_ATTEMPTS)
        .await
        .unwrap_or(DEFAULT_MAX_ATTEMPTS)
        .clamp(1, 100) as u32
}

#[derive(Clone)]
pub struct JobProcessor {
    db: SqlitePool,
    event_bus: EventBus,
    intelligence: Arc<dyn DocumentIntelligence>,
    wakeup: Arc<Notify>,
}

impl JobProcessor {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        intelligence: Arc<dyn DocumentIntelligence>,
        wakeup: Arc<Notify>,
    ) -> Self {
        Self {
            db,
            event_bus,
            intelligence,
            wakeup,
        }
    }

    /// Poll until `cancel` fires
    ///
    /// An in-flight job always runs to the end of its attempt before the
    /// cancellation is observed.
    pub async fn run(self, cancel: CancellationToken) {
        match db::jobs::recover_interrupted_jobs(&self.db).await {
            Ok(0) => {}
            Ok(n) => warn!("Returned {} interrupted job(s) to the queue", n),
            Err(e) => error!("Failed to recover interrupted jobs: {}", e),
        }

        info!("Job processor started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let drained = match self.process_next().await {
                Ok(Some(JobOutcome::Completed(_))) => false,
                Ok(Some(_)) | Ok(None) => true,
                Err(e) => {
                    error!("Job processor error: {}", e);
                    true
                }
            };
            if !drained {
                continue;
            }

            let interval = poll_interval(&self.db).await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.wakeup.notified() => debug!("Job processor woken"),
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Job processor stopped");
    }

    /// Claim and run the oldest pending job; `None` when the queue is empty
    pub async fn process_next(&self) -> Result<Option<JobOutcome>> {
        let Some(job) = db::jobs::claim_next_job(&self.db).await? else {
            return Ok(None);
        };

        info!(
            job_id = %job.id,
            document_id = %job.document_id,
            step = %job.current_step,
            attempt = job.attempts + 1,
            max_attempts = job.max_attempts,
            "Processing job"
        );

        let finished = match self.run_steps(&job).await {
            Ok(document) => self
                .complete(&job, &document)
                .await
                .map(|()| JobOutcome::Completed(job.id)),
            Err(err) => self.fail_attempt(&job, err).await,
        };

        match finished {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) => {
                self.release(&job).await;
                Err(e)
            }
        }
    }

    /// Hand a claimed job back to the queue after its result could not be recorded
    ///
    /// The attempt is not counted; the job resumes at its last recorded step.
    async fn release(&self, job: &BackgroundJob) {
        match db::jobs::release_claim(&self.db, job.id).await {
            Ok(true) => warn!(job_id = %job.id, "Returned job to the queue after a storage error"),
            Ok(false) => {}
            Err(e) => error!(job_id = %job.id, "Failed to return job to the queue: {}", e),
        }
    }

    async fn run_steps(&self, job: &BackgroundJob) -> std::result::Result<Document, AttemptError> {
        let mut document = db::documents::get_document(&self.db, job.document_id)
            .await?
            .ok_or_else(|| AttemptError::Permanent(format!("Document {} no longer exists", job.document_id)))?;
        let request = db::requests::get_request(&self.db, document.request_id)
            .await?
            .ok_or_else(|| {
                AttemptError::Permanent(format!("Request {} no longer exists", document.request_id))
            })?;

        let document_id = document.id;
        retry_on_lock("mark document processing", DEFAULT_MAX_LOCK_WAIT_MS, || {
            db::documents::set_analysis_status(&self.db, document_id, AnalysisStatus::Processing)
        })
        .await?;

        let mut step = job.current_step;
        if step == JobStep::Queued {
            step = JobStep::Uploading;
            self.advance(job, step).await?;
        }

        while step != JobStep::Completed {
            match step {
                JobStep::Uploading => {
                    if document.openai_file_id.is_none() {
                        let file_id = self
                            .intelligence
                            .upload_file(Path::new(&document.stored_path), &document.original_filename)
                            .await?;
                        retry_on_lock("store file id", DEFAULT_MAX_LOCK_WAIT_MS, || {
                            db::documents::set_openai_file_id(&self.db, document_id, &file_id)
                        })
                        .await?;
                        document.openai_file_id = Some(file_id);
                    }
                }
                JobStep::Vectorizing => {
                    if document.vector_store_file_id.is_none() {
                        let file_id = uploaded_file_id(&document)?;
                        let attributes = vector_store_attributes(&document, &request);
                        let vs_file_id = self
                            .intelligence
                            .attach_to_vector_store(&file_id, attributes.clone())
                            .await?;
                        let metadata = Value::Object(attributes);
                        retry_on_lock("store vector store file", DEFAULT_MAX_LOCK_WAIT_MS, || {
                            db::documents::set_vector_store_file(&self.db, document_id, &vs_file_id, &metadata)
                        })
                        .await?;
                        document.vector_store_file_id = Some(vs_file_id);
                        document.metadata = Some(metadata);
                    }
                }
                JobStep::Summarizing => {
                    let file_id = uploaded_file_id(&document)?;
                    let summary = self.intelligence.summarize_document(&file_id).await?;
                    retry_on_lock("store summary", DEFAULT_MAX_LOCK_WAIT_MS, || {
                        db::documents::set_summary(&self.db, document_id, &summary)
                    })
                    .await?;
                    document.summary = Some(summary);
                }
                JobStep::GeneratingInsights => {
                    let file_ids = [uploaded_file_id(&document)?];
                    let insights = self
                        .intelligence
                        .generate_insights(&file_ids, InsightFocus::General)
                        .await?;
                    retry_on_lock("store insights", DEFAULT_MAX_LOCK_WAIT_MS, || {
                        db::documents::set_insights(&self.db, document_id, &insights)
                    })
                    .await?;
                    document.insights = Some(insights);
                }
                JobStep::Queued | JobStep::Completed => {}
            }

            let Some(next) = step.next() else { break };
            step = next;
            if step != JobStep::Completed {
                self.advance(job, step).await?;
            }
        }

        Ok(document)
    }

    async fn advance(&self, job: &BackgroundJob, step: JobStep) -> Result<()> {
        retry_on_lock("advance job step", DEFAULT_MAX_LOCK_WAIT_MS, || {
            db::jobs::advance_step(&self.db, job.id, step)
        })
        .await?;

        debug!(job_id = %job.id, step = %step, progress = step.progress(), "Job advanced");
        self.event_bus.emit_lossy(InvestEvent::JobProgress {
            job_id: job.id,
            document_id: job.document_id,
            step: step.to_string(),
            progress: step.progress(),
            timestamp: now(),
        });
        Ok(())
    }

    async fn complete(&self, job: &BackgroundJob, document: &Document) -> Result<()> {
        retry_on_lock("complete job", DEFAULT_MAX_LOCK_WAIT_MS, || {
            db::jobs::mark_completed(&self.db, job.id)
        })
        .await?;
        retry_on_lock("complete document", DEFAULT_MAX_LOCK_WAIT_MS, || {
            db::documents::set_analysis_status(&self.db, document.id, AnalysisStatus::Completed)
        })
        .await?;

        info!(job_id = %job.id, document = %document.original_filename, "Document analysis completed");

        self.event_bus.emit_lossy(InvestEvent::JobProgress {
            job_id: job.id,
            document_id: document.id,
            step: JobStep::Completed.to_string(),
            progress: JobStep::Completed.progress(),
            timestamp: now(),
        });
        self.event_bus.emit_lossy(InvestEvent::JobCompleted {
            job_id: job.id,
            document_id: document.id,
            timestamp: now(),
        });

        let message = Message {
            kind: notifier::ANALYSIS_COMPLETED,
            title: format!("Analysis ready: {}", document.original_filename),
            message: format!("AI summary and insights for {} are available.", document.original_filename),
            request_id: Some(document.request_id),
        };
        self.notify_uploader(document.uploaded_by, &message).await;
        Ok(())
    }

    async fn fail_attempt(&self, job: &BackgroundJob, err: AttemptError) -> Result<JobOutcome> {
        let attempts = job.attempts + 1;
        let error_message = err.message().to_string();
        let will_retry = matches!(err, AttemptError::Retryable(_)) && job.can_retry_after_failure();

        if will_retry {
            warn!(
                job_id = %job.id,
                attempt = attempts,
                max_attempts = job.max_attempts,
                "Job attempt failed, will retry: {}",
                error_message
            );
            retry_on_lock("requeue job", DEFAULT_MAX_LOCK_WAIT_MS, || {
                db::jobs::requeue_after_failure(&self.db, job.id, attempts, &error_message)
            })
            .await?;
        } else {
            error!(
                job_id = %job.id,
                attempts,
                "Job failed permanently: {}",
                error_message
            );
            retry_on_lock("fail job", DEFAULT_MAX_LOCK_WAIT_MS, || {
                db::jobs::mark_failed(&self.db, job.id, attempts, &error_message)
            })
            .await?;
        }

        self.event_bus.emit_lossy(InvestEvent::JobFailed {
            job_id: job.id,
            document_id: job.document_id,
            error: error_message.clone(),
            attempts,
            will_retry,
            timestamp: now(),
        });

        if will_retry {
            return Ok(JobOutcome::Retrying(job.id));
        }

        // The document row may be gone; only a live one gets a status and a notice
        if let Some(document) = db::documents::get_document(&self.db, job.document_id).await? {
            retry_on_lock("fail document", DEFAULT_MAX_LOCK_WAIT_MS, || {
                db::documents::set_analysis_status(&self.db, document.id, AnalysisStatus::Failed)
            })
            .await?;

            let message = Message {
                kind: notifier::ANALYSIS_FAILED,
                title: format!("Analysis failed: {}", document.original_filename),
                message: format!(
                    "Analysis of {} failed after {} attempt(s): {}",
                    document.original_filename, attempts, error_message
                ),
                request_id: Some(document.request_id),
            };
            self.notify_uploader(document.uploaded_by, &message).await;
        }

        Ok(JobOutcome::Failed(job.id))
    }

    /// Notification failures are logged; the job result stands
    async fn notify_uploader(&self, user_id: Uuid, message: &Message) {
        match self.insert_notification(user_id, message).await {
            Ok(notification) => notifier::announce(&self.event_bus, &[notification]),
            Err(e) => warn!(user_id = %user_id, "Failed to notify uploader: {}", e),
        }
    }

    async fn insert_notification(&self, user_id: Uuid, message: &Message) -> Result<Notification> {
        let mut conn = self.db.acquire().await?;
        notifier::notify_user(&mut conn, user_id, message).await
    }
}

fn uploaded_file_id(document: &Document) -> std::result::Result<String, AttemptError> {
    document
        .openai_file_id
        .clone()
        .ok_or_else(|| AttemptError::Retryable(format!("Document {} has no uploaded file", document.id)))
}

/// Filename metadata overlaid with the request context
///
/// Request keys win on collision. The same map is stored as the document's
/// `metadata`.
fn vector_store_attributes(document: &Document, request: &InvestmentRequest) -> Map<String, Value> {
    let mut attributes = extract_metadata_from_filename(&document.original_filename).to_attributes();
    attributes.insert("request_id".into(), Value::from(request.id.to_string()));
    attributes.insert("request_code".into(), Value::from(request.request_code.clone()));
    attributes.insert("investment_type".into(), Value::from(request.investment_type.clone()));
    attributes.insert("document_id".into(), Value::from(document.id.to_string()));
    attributes.insert("original_filename".into(), Value::from(document.original_filename.clone()));
    attributes
}
