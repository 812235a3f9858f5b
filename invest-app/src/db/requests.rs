//! Investment requests

use chrono::{DateTime, Utc};
use invest_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{enum_col, now, opt_time_col, opt_ts, opt_uuid_col, time_col, ts, uuid_col};
use crate::models::{InvestmentRequest, RequestStatus};

const REQUEST_COLUMNS: &str = "id, request_code, title, description, investment_type, amount, currency, \
     expected_return, risk_level, status, requester_id, template_id, created_at, updated_at, \
     submitted_at, decided_at";

fn row_to_request(row: &SqliteRow) -> Result<InvestmentRequest> {
    Ok(InvestmentRequest {
        id: uuid_col(row, "id")?,
        request_code: row.try_get("request_code")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        investment_type: row.try_get("investment_type")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        expected_return: row.try_get("expected_return")?,
        risk_level: enum_col(row, "risk_level")?,
        status: enum_col(row, "status")?,
        requester_id: uuid_col(row, "requester_id")?,
        template_id: opt_uuid_col(row, "template_id")?,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
        submitted_at: opt_time_col(row, "submitted_at")?,
        decided_at: opt_time_col(row, "decided_at")?,
    })
}

/// Next free code for `year`, `INV-<year>-<seq:04>`
///
/// Soft-deleted requests keep their codes, so numbers are never reused.
pub async fn next_request_code(conn: &mut SqliteConnection, year: i32) -> Result<String> {
    let prefix = format!("INV-{}-", year);
    let last: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(CAST(substr(request_code, ?) AS INTEGER)) FROM investment_requests WHERE request_code LIKE ?",
    )
    .bind(prefix.len() as i64 + 1)
    .bind(format!("{}%", prefix))
    .fetch_one(&mut *conn)
    .await?;

    Ok(format!("{}{:04}", prefix, last.unwrap_or(0) + 1))
}

/// Insert a request, assigning its code in the same transaction
pub async fn insert_request(conn: &mut SqliteConnection, request: &mut InvestmentRequest) -> Result<()> {
    use chrono::Datelike;

    request.request_code = next_request_code(conn, request.created_at.year()).await?;

    sqlx::query(
        r#"
        INSERT INTO investment_requests (
            id, request_code, title, description, investment_type, amount, currency,
            expected_return, risk_level, status, requester_id, template_id,
            created_at, updated_at, submitted_at, decided_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(request.id.to_string())
    .bind(&request.request_code)
    .bind(&request.title)
    .bind(&request.description)
    .bind(&request.investment_type)
    .bind(request.amount)
    .bind(&request.currency)
    .bind(request.expected_return)
    .bind(request.risk_level.as_str())
    .bind(request.status.as_str())
    .bind(request.requester_id.to_string())
    .bind(request.template_id.map(|id| id.to_string()))
    .bind(ts(request.created_at))
    .bind(ts(request.updated_at))
    .bind(opt_ts(request.submitted_at))
    .bind(opt_ts(request.decided_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_request<'e, E>(executor: E, id: Uuid) -> Result<Option<InvestmentRequest>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM investment_requests WHERE id = ? AND deleted_at IS NULL",
        REQUEST_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(row_to_request).transpose()
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub requester_id: Option<Uuid>,
}

/// Newest first
pub async fn list_requests(pool: &SqlitePool, filter: &RequestFilter) -> Result<Vec<InvestmentRequest>> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM investment_requests WHERE deleted_at IS NULL",
        REQUEST_COLUMNS
    ));
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(requester_id) = filter.requester_id {
        query.push(" AND requester_id = ").push_bind(requester_id.to_string());
    }
    query.push(" ORDER BY created_at DESC");

    let rows = query.build().fetch_all(pool).await?;
    rows.iter().map(row_to_request).collect()
}

/// Statuses in which the requester may still change or delete a request
const EDITABLE_STATUSES: &str = "('draft', 'changes_requested')";

/// Persist the editable fields of a request
///
/// Returns false unless the request is live and still editable, so an edit
/// cannot land after a concurrent submit.
pub async fn update_request(pool: &SqlitePool, request: &InvestmentRequest) -> Result<bool> {
    let result = sqlx::query(&format!(
        r#"
        UPDATE investment_requests
        SET title = ?, description = ?, investment_type = ?, amount = ?, currency = ?,
            expected_return = ?, risk_level = ?, updated_at = ?
        WHERE id = ? AND deleted_at IS NULL AND status IN {}
        "#,
        EDITABLE_STATUSES
    ))
    .bind(&request.title)
    .bind(&request.description)
    .bind(&request.investment_type)
    .bind(request.amount)
    .bind(&request.currency)
    .bind(request.expected_return)
    .bind(request.risk_level.as_str())
    .bind(ts(request.updated_at))
    .bind(request.id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Move a request to `status` if it is still in `expected`
///
/// Returns false when another transition got there first.
pub async fn transition_status(
    conn: &mut SqliteConnection,
    id: Uuid,
    expected: RequestStatus,
    status: RequestStatus,
    submitted_at: Option<DateTime<Utc>>,
    decided_at: Option<DateTime<Utc>>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE investment_requests
        SET status = ?, updated_at = ?,
            submitted_at = COALESCE(?, submitted_at),
            decided_at = COALESCE(?, decided_at)
        WHERE id = ? AND status = ? AND deleted_at IS NULL
        "#,
    )
    .bind(status.as_str())
    .bind(ts(now()))
    .bind(opt_ts(submitted_at))
    .bind(opt_ts(decided_at))
    .bind(id.to_string())
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Soft-delete a live request that is still editable
pub async fn soft_delete_request(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(&format!(
        "UPDATE investment_requests SET deleted_at = ?, updated_at = ? \
         WHERE id = ? AND deleted_at IS NULL AND status IN {}",
        EDITABLE_STATUSES
    ))
    .bind(ts(now()))
    .bind(ts(now()))
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// (status, count) for every status with at least one live request
pub async fn count_by_status(pool: &SqlitePool, requester_id: Option<Uuid>) -> Result<Vec<(String, i64)>> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT status, COUNT(*) FROM investment_requests WHERE deleted_at IS NULL",
    );
    if let Some(requester_id) = requester_id {
        query.push(" AND requester_id = ").push_bind(requester_id.to_string());
    }
    query.push(" GROUP BY status ORDER BY status");

    let rows: Vec<(String, i64)> = query.build_query_as().fetch_all(pool).await?;
    Ok(rows)
}
