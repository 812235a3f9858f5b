//! Approval and revision tasks

use invest_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{enum_col, now, opt_enum_col, opt_time_col, opt_uuid_col, time_col, ts, uuid_col};
use crate::models::{Task, TaskStatus, TaskType, User};

const TASK_SELECT: &str = r#"
    SELECT t.id, t.request_id, r.request_code, r.title AS request_title, t.task_type, t.stage,
           t.assignee_role, t.assignee_id, t.status, t.created_at, t.completed_at, t.completed_by
    FROM tasks t
    JOIN investment_requests r ON r.id = t.request_id
    WHERE r.deleted_at IS NULL
"#;

fn row_to_task(row: &SqliteRow) -> Result<Task> {
    Ok(Task {
        id: uuid_col(row, "id")?,
        request_id: uuid_col(row, "request_id")?,
        request_code: row.try_get("request_code")?,
        request_title: row.try_get("request_title")?,
        task_type: enum_col(row, "task_type")?,
        stage: opt_enum_col(row, "stage")?,
        assignee_role: enum_col(row, "assignee_role")?,
        assignee_id: opt_uuid_col(row, "assignee_id")?,
        status: enum_col(row, "status")?,
        created_at: time_col(row, "created_at")?,
        completed_at: opt_time_col(row, "completed_at")?,
        completed_by: opt_uuid_col(row, "completed_by")?,
    })
}

/// Insert a task; the joined request fields are ignored
pub async fn insert_task<'e, E>(executor: E, task: &Task) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO tasks (id, request_id, task_type, stage, assignee_role, assignee_id, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(task.id.to_string())
    .bind(task.request_id.to_string())
    .bind(task.task_type.as_str())
    .bind(task.stage.map(|s| s.as_str()))
    .bind(task.assignee_role.as_str())
    .bind(task.assignee_id.map(|id| id.to_string()))
    .bind(task.status.as_str())
    .bind(ts(task.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Complete the request's pending tasks of `task_type`
pub async fn complete_open_tasks(
    conn: &mut SqliteConnection,
    request_id: Uuid,
    task_type: TaskType,
    completed_by: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE tasks SET status = 'completed', completed_at = ?, completed_by = ?
        WHERE request_id = ? AND task_type = ? AND status = 'pending'
        "#,
    )
    .bind(ts(now()))
    .bind(completed_by.to_string())
    .bind(request_id.to_string())
    .bind(task_type.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Cancel the request's pending tasks, optionally only those of `task_type`
pub async fn cancel_open_tasks(
    conn: &mut SqliteConnection,
    request_id: Uuid,
    task_type: Option<TaskType>,
) -> Result<u64> {
    let mut query = QueryBuilder::<Sqlite>::new("UPDATE tasks SET status = 'cancelled', completed_at = ");
    query
        .push_bind(ts(now()))
        .push(" WHERE status = 'pending' AND request_id = ")
        .push_bind(request_id.to_string());
    if let Some(task_type) = task_type {
        query.push(" AND task_type = ").push_bind(task_type.as_str());
    }

    let result = query.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Tasks addressed to the user directly or to their role; admins see all
pub async fn list_tasks_for_user(
    pool: &SqlitePool,
    user: &User,
    status: Option<TaskStatus>,
) -> Result<Vec<Task>> {
    let mut query = QueryBuilder::<Sqlite>::new(TASK_SELECT);
    if !user.is_admin() {
        query
            .push(" AND (t.assignee_id = ")
            .push_bind(user.id.to_string())
            .push(" OR (t.assignee_id IS NULL AND t.assignee_role = ")
            .push_bind(user.role.as_str())
            .push("))");
    }
    if let Some(status) = status {
        query.push(" AND t.status = ").push_bind(status.as_str());
    }
    query.push(" ORDER BY t.created_at DESC");

    let rows = query.build().fetch_all(pool).await?;
    rows.iter().map(row_to_task).collect()
}

pub async fn list_tasks_for_request(pool: &SqlitePool, request_id: Uuid) -> Result<Vec<Task>> {
    let rows = sqlx::query(&format!("{} AND t.request_id = ? ORDER BY t.created_at, t.rowid", TASK_SELECT))
        .bind(request_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_task).collect()
}

pub async fn count_pending_for_user(pool: &SqlitePool, user: &User) -> Result<i64> {
    Ok(list_tasks_for_user(pool, user, Some(TaskStatus::Pending)).await?.len() as i64)
}
