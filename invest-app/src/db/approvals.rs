//! Recorded approval decisions

use invest_common::Result;
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{enum_col, time_col, ts, uuid_col};
use crate::models::Approval;

/// `approver_name` is derived on read and not stored
pub async fn insert_approval<'e, E>(executor: E, approval: &Approval) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO approvals (id, request_id, stage, approver_id, decision, comments, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(approval.id.to_string())
    .bind(approval.request_id.to_string())
    .bind(approval.stage.as_str())
    .bind(approval.approver_id.to_string())
    .bind(approval.decision.as_str())
    .bind(&approval.comments)
    .bind(ts(approval.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Decision history of a request, oldest first
pub async fn list_approvals(pool: &SqlitePool, request_id: Uuid) -> Result<Vec<Approval>> {
    let rows = sqlx::query(
        r#"
        SELECT a.id, a.request_id, a.stage, a.approver_id, u.display_name AS approver_name,
               a.decision, a.comments, a.created_at
        FROM approvals a
        JOIN users u ON u.id = a.approver_id
        WHERE a.request_id = ?
        ORDER BY a.created_at, a.rowid
        "#,
    )
    .bind(request_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(Approval {
                id: uuid_col(row, "id")?,
                request_id: uuid_col(row, "request_id")?,
                stage: enum_col(row, "stage")?,
                approver_id: uuid_col(row, "approver_id")?,
                approver_name: row.try_get("approver_name")?,
                decision: enum_col(row, "decision")?,
                comments: row.try_get("comments")?,
                created_at: time_col(row, "created_at")?,
            })
        })
        .collect()
}
