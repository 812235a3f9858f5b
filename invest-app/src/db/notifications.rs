//! Per-user notifications

use invest_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{now, opt_time_col, opt_ts, opt_uuid_col, time_col, ts, uuid_col};
use crate::models::Notification;

fn row_to_notification(row: &SqliteRow) -> Result<Notification> {
    Ok(Notification {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        kind: row.try_get("kind")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        request_id: opt_uuid_col(row, "request_id")?,
        read_at: opt_time_col(row, "read_at")?,
        created_at: time_col(row, "created_at")?,
    })
}

pub async fn insert_notification<'e, E>(executor: E, notification: &Notification) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, kind, title, message, request_id, read_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(notification.id.to_string())
    .bind(notification.user_id.to_string())
    .bind(&notification.kind)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.request_id.map(|id| id.to_string()))
    .bind(opt_ts(notification.read_at))
    .bind(ts(notification.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Newest first
pub async fn list_notifications(pool: &SqlitePool, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT id, user_id, kind, title, message, request_id, read_at, created_at FROM notifications WHERE user_id = ",
    );
    query.push_bind(user_id.to_string());
    if unread_only {
        query.push(" AND read_at IS NULL");
    }
    query.push(" ORDER BY created_at DESC");

    let rows = query.build().fetch_all(pool).await?;
    rows.iter().map(row_to_notification).collect()
}

/// Mark one of the user's notifications read
///
/// Returns false if it does not exist or belongs to someone else.
pub async fn mark_read(pool: &SqlitePool, id: Uuid, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE notifications SET read_at = COALESCE(read_at, ?) WHERE id = ? AND user_id = ?",
    )
    .bind(ts(now()))
    .bind(id.to_string())
    .bind(user_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn mark_all_read(pool: &SqlitePool, user_id: Uuid) -> Result<u64> {
    let result = sqlx::query("UPDATE notifications SET read_at = ? WHERE user_id = ? AND read_at IS NULL")
        .bind(ts(now()))
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn unread_count(pool: &SqlitePool, user_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read_at IS NULL")
            .bind(user_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count)
}
