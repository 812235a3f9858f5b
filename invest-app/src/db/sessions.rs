//! Login sessions
//!
//! Only the SHA-256 of a session token is stored.

use chrono::{DateTime, Utc};
use invest_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::users::row_to_user;
use super::{now, ts};
use crate::models::User;

pub async fn create_session(
    pool: &SqlitePool,
    token_hash: &str,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(token_hash)
        .bind(user_id.to_string())
        .bind(ts(now()))
        .bind(ts(expires_at))
        .execute(pool)
        .await?;

    Ok(())
}

/// Active user owning an unexpired session
pub async fn user_for_session(pool: &SqlitePool, token_hash: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT u.id, u.username, u.display_name, u.email, u.role, u.password_hash,
               u.active, u.created_at, u.updated_at
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = ? AND s.expires_at > ? AND u.active = 1
        "#,
    )
    .bind(token_hash)
    .bind(ts(now()))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_user).transpose()
}

pub async fn delete_session(pool: &SqlitePool, token_hash: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop every session of a user (deactivation, password change)
pub async fn delete_user_sessions(pool: &SqlitePool, user_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(ts(now()))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
