//! Background job queue
//!
//! Claiming is a conditional single-row update, so a job is only ever owned
//! by the worker whose update flipped it from `pending` to `processing`.

use invest_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{enum_col, now, opt_time_col, time_col, ts, uuid_col};
use crate::models::job::DOCUMENT_ANALYSIS;
use crate::models::{BackgroundJob, JobStatus, JobStep};

const JOB_COLUMNS: &str = "id, job_type, document_id, status, current_step, attempts, max_attempts, \
     last_error, progress, created_at, updated_at, started_at, completed_at";

fn row_to_job(row: &SqliteRow) -> Result<BackgroundJob> {
    let attempts: i64 = row.try_get("attempts")?;
    let max_attempts: i64 = row.try_get("max_attempts")?;
    let progress: i64 = row.try_get("progress")?;

    Ok(BackgroundJob {
        id: uuid_col(row, "id")?,
        job_type: row.try_get("job_type")?,
        document_id: uuid_col(row, "document_id")?,
        status: enum_col(row, "status")?,
        current_step: enum_col(row, "current_step")?,
        attempts: attempts.max(0) as u32,
        max_attempts: max_attempts.max(1) as u32,
        last_error: row.try_get("last_error")?,
        progress: progress.clamp(0, 100) as u8,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
        started_at: opt_time_col(row, "started_at")?,
        completed_at: opt_time_col(row, "completed_at")?,
    })
}

/// Queue a document analysis job
pub async fn enqueue_job<'e, E>(executor: E, document_id: Uuid, max_attempts: u32) -> Result<BackgroundJob>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let created = now();
    let job = BackgroundJob {
        id: Uuid::new_v4(),
        job_type: DOCUMENT_ANALYSIS.to_string(),
        document_id,
        status: JobStatus::Pending,
        current_step: JobStep::Queued,
        attempts: 0,
        max_attempts: max_attempts.max(1),
        last_error: None,
        progress: 0,
        created_at: created,
        updated_at: created,
        started_at: None,
        completed_at: None,
    };

    sqlx::query(
        r#"
        INSERT INTO background_jobs (
            id, job_type, document_id, status, current_step, attempts, max_attempts,
            progress, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, 0, ?, 0, ?, ?)
        "#,
    )
    .bind(job.id.to_string())
    .bind(&job.job_type)
    .bind(document_id.to_string())
    .bind(job.status.as_str())
    .bind(job.current_step.as_str())
    .bind(job.max_attempts as i64)
    .bind(ts(created))
    .bind(ts(created))
    .execute(executor)
    .await?;

    Ok(job)
}

pub async fn get_job(pool: &SqlitePool, id: Uuid) -> Result<Option<BackgroundJob>> {
    let row = sqlx::query(&format!("SELECT {} FROM background_jobs WHERE id = ?", JOB_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_job).transpose()
}

/// Newest first; `requester_id` limits to jobs on that user's requests
pub async fn list_jobs(
    pool: &SqlitePool,
    status: Option<JobStatus>,
    requester_id: Option<Uuid>,
) -> Result<Vec<BackgroundJob>> {
    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM background_jobs WHERE 1 = 1", JOB_COLUMNS));
    if let Some(status) = status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(requester_id) = requester_id {
        query
            .push(
                " AND document_id IN (SELECT d.id FROM documents d \
                 JOIN investment_requests r ON r.id = d.request_id WHERE r.requester_id = ",
            )
            .push_bind(requester_id.to_string())
            .push(")");
    }
    query.push(" ORDER BY created_at DESC");

    let rows = query.build().fetch_all(pool).await?;
    rows.iter().map(row_to_job).collect()
}

/// Owner of the request a job's document belongs to, deleted rows included
pub async fn job_requester(pool: &SqlitePool, id: Uuid) -> Result<Option<Uuid>> {
    let requester: Option<String> = sqlx::query_scalar(
        r#"
        SELECT r.requester_id
        FROM background_jobs j
        JOIN documents d ON d.id = j.document_id
        JOIN investment_requests r ON r.id = d.request_id
        WHERE j.id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    requester
        .map(|v| {
            Uuid::parse_str(&v)
                .map_err(|e| invest_common::Error::Internal(format!("Invalid requester_id '{}': {}", v, e)))
        })
        .transpose()
}

pub async fn list_jobs_for_document(pool: &SqlitePool, document_id: Uuid) -> Result<Vec<BackgroundJob>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM background_jobs WHERE document_id = ? ORDER BY created_at DESC",
        JOB_COLUMNS
    ))
    .bind(document_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_job).collect()
}

/// Pending or processing job of a document, if any
pub async fn active_job_for_document(pool: &SqlitePool, document_id: Uuid) -> Result<Option<BackgroundJob>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM background_jobs WHERE document_id = ? AND status IN ('pending', 'processing') \
         ORDER BY created_at LIMIT 1",
        JOB_COLUMNS
    ))
    .bind(document_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_job).transpose()
}

/// Claim the oldest pending job
///
/// Returns `None` when the queue is empty.
pub async fn claim_next_job(pool: &SqlitePool) -> Result<Option<BackgroundJob>> {
    loop {
        let candidate: Option<String> = sqlx::query_scalar(
            "SELECT id FROM background_jobs WHERE status = 'pending' ORDER BY created_at, rowid LIMIT 1",
        )
        .fetch_optional(pool)
        .await?;

        let Some(id) = candidate else {
            return Ok(None);
        };

        let at = ts(now());
        let claimed = sqlx::query(
            r#"
            UPDATE background_jobs
            SET status = 'processing', started_at = COALESCE(started_at, ?), updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(&at)
        .bind(&at)
        .bind(&id)
        .execute(pool)
        .await?
        .rows_affected()
            == 1;

        if claimed {
            let row = sqlx::query(&format!("SELECT {} FROM background_jobs WHERE id = ?", JOB_COLUMNS))
                .bind(&id)
                .fetch_one(pool)
                .await?;
            return row_to_job(&row).map(Some);
        }
        // Lost the race for this row; look again
    }
}

/// Record that the job has reached `step`
pub async fn advance_step(pool: &SqlitePool, id: Uuid, step: JobStep) -> Result<()> {
    sqlx::query("UPDATE background_jobs SET current_step = ?, progress = ?, updated_at = ? WHERE id = ?")
        .bind(step.as_str())
        .bind(step.progress() as i64)
        .bind(ts(now()))
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Return a failed attempt to the queue at its current step
pub async fn requeue_after_failure(pool: &SqlitePool, id: Uuid, attempts: u32, error: &str) -> Result<()> {
    sqlx::query(
        "UPDATE background_jobs SET status = 'pending', attempts = ?, last_error = ?, updated_at = ? WHERE id = ?",
    )
    .bind(attempts as i64)
    .bind(error)
    .bind(ts(now()))
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &SqlitePool, id: Uuid, attempts: u32, error: &str) -> Result<()> {
    let at = ts(now());
    sqlx::query(
        r#"
        UPDATE background_jobs
        SET status = 'failed', attempts = ?, last_error = ?, updated_at = ?, completed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(attempts as i64)
    .bind(error)
    .bind(&at)
    .bind(&at)
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_completed(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let at = ts(now());
    sqlx::query(
        r#"
        UPDATE background_jobs
        SET status = 'completed', current_step = 'completed', progress = 100,
            last_error = NULL, updated_at = ?, completed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&at)
    .bind(&at)
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Return a job this worker still holds in `processing` to the queue
///
/// Attempts are unchanged. Returns false if the job already left `processing`.
pub async fn release_claim(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE background_jobs SET status = 'pending', updated_at = ? WHERE id = ? AND status = 'processing'",
    )
    .bind(ts(now()))
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Put a failed job back in the queue with a fresh attempt budget
///
/// Returns false unless the job exists and is `failed`.
pub async fn retry_failed_job(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE background_jobs
        SET status = 'pending', attempts = 0, last_error = NULL, completed_at = NULL, updated_at = ?
        WHERE id = ? AND status = 'failed'
        "#,
    )
    .bind(ts(now()))
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Return jobs orphaned in `processing` by a crash to the queue
pub async fn recover_interrupted_jobs(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE background_jobs SET status = 'pending', updated_at = ? WHERE status = 'processing'",
    )
    .bind(ts(now()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn count_by_status(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM background_jobs GROUP BY status ORDER BY status")
            .fetch_all(pool)
            .await?;
    Ok(rows)
}
