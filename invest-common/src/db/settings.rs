//! Runtime settings stored in the `settings` table

use crate::{Error, Result};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::warn;

/// Generic setting getter
///
/// Returns None if the key doesn't exist or holds NULL.
pub async fn get_setting<T: FromStr>(pool: &SqlitePool, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    match value.flatten() {
        Some(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("Failed to parse setting '{}' value: {}", key, s))),
        None => Ok(None),
    }
}

/// Integer setting with fallback
///
/// Missing or unparsable values yield `default` (a warning is logged for the latter).
pub async fn get_i64_setting(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    match get_setting::<i64>(pool, key).await {
        Ok(Some(v)) => Ok(v),
        Ok(None) => Ok(default),
        Err(Error::Config(msg)) => {
            warn!("{}; using default {}", msg, default);
            Ok(default)
        }
        Err(e) => Err(e),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T: ToString>(pool: &SqlitePool, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    #[tokio::test]
    async fn test_set_and_get() {
        let pool = init_memory_database().await.unwrap();

        set_setting(&pool, "job_poll_interval_secs", 20).await.unwrap();
        let value: Option<u64> = get_setting(&pool, "job_poll_interval_secs").await.unwrap();
        assert_eq!(value, Some(20));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let pool = init_memory_database().await.unwrap();
        let value: Option<String> = get_setting(&pool, "no_such_key").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_unparsable_i64_falls_back() {
        let pool = init_memory_database().await.unwrap();

        set_setting(&pool, "job_max_attempts", "three").await.unwrap();
        assert_eq!(get_i64_setting(&pool, "job_max_attempts", 3).await.unwrap(), 3);

        assert!(get_setting::<i64>(&pool, "job_max_attempts").await.is_err());
    }
}
