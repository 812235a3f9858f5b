//! User accounts

use invest_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{enum_col, time_col, ts, uuid_col};
use crate::models::{Role, User};

pub(crate) const USER_COLUMNS: &str =
    "id, username, display_name, email, role, password_hash, active, created_at, updated_at";

pub(crate) fn row_to_user(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: uuid_col(row, "id")?,
        username: row.try_get("username")?,
        display_name: row.try_get("display_name")?,
        email: row.try_get("email")?,
        role: enum_col(row, "role")?,
        password_hash: row.try_get("password_hash")?,
        active: row.try_get("active")?,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
    })
}

pub async fn insert_user<'e, E>(executor: E, user: &User) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO users (id, username, display_name, email, role, password_hash, active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.username)
    .bind(&user.display_name)
    .bind(&user.email)
    .bind(user.role.as_str())
    .bind(&user.password_hash)
    .bind(user.active)
    .bind(ts(user.created_at))
    .bind(ts(user.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn get_user<'e, E>(executor: E, id: Uuid) -> Result<Option<User>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(row_to_user).transpose()
}

pub async fn get_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
        .bind(username)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_user).transpose()
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY username", USER_COLUMNS))
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_user).collect()
}

/// Persist every mutable field of `user`
pub async fn update_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET display_name = ?, email = ?, role = ?, password_hash = ?, active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.display_name)
    .bind(&user.email)
    .bind(user.role.as_str())
    .bind(&user.password_hash)
    .bind(user.active)
    .bind(ts(user.updated_at))
    .bind(user.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Ids of active users holding `role`, for role-wide notifications
pub async fn active_user_ids_with_role(conn: &mut SqliteConnection, role: Role) -> Result<Vec<Uuid>> {
    let rows = sqlx::query("SELECT id FROM users WHERE role = ? AND active = 1 ORDER BY username")
        .bind(role.as_str())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(|row| uuid_col(row, "id")).collect()
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
