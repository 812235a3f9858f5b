//! Database schema migrations
//!
//! Versioned, idempotent schema upgrades tracked in the `schema_version` table.
//! Tables are created with their current shape by [`crate::db::init`]; each
//! migration only patches databases written by older releases.
//!
//! Never modify an existing migration. Add a new `migrate_vN` and bump
//! [`CURRENT_SCHEMA_VERSION`].

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    if !table_exists(pool, "schema_version").await? {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: baseline schema
///
/// Every table is created by init; this only adds the partial index used by
/// the job processor's claim query.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    if !table_exists(pool, "background_jobs").await? {
        info!("  background_jobs table doesn't exist yet - skipping migration");
        return Ok(());
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_jobs_pending ON background_jobs(created_at) WHERE status = 'pending'",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Migration v2: document metadata and template risk defaults
///
/// Early databases stored neither the extracted document metadata nor a
/// default risk level on templates.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    add_column_if_missing(pool, "documents", "metadata", "TEXT").await?;
    add_column_if_missing(
        pool,
        "templates",
        "default_risk_level",
        "TEXT CHECK (default_risk_level IS NULL OR default_risk_level IN ('low', 'medium', 'high'))",
    )
    .await?;

    Ok(())
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?)",
    )
    .bind(table)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

async fn add_column_if_missing(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<()> {
    if !table_exists(pool, table).await? {
        info!("  {} table doesn't exist yet - skipping", table);
        return Ok(());
    }

    if column_exists(pool, table, column).await? {
        return Ok(());
    }

    let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition);
    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => {
            info!("  Added {} column to {} table", column, table);
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            info!("  {}.{} added concurrently - skipping", table, column);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn bare_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_version_zero_without_table() {
        let pool = bare_pool().await;
        assert_eq!(get_schema_version(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_v2_adds_missing_columns() {
        let pool = bare_pool().await;

        sqlx::query(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO schema_version (version) VALUES (1)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE documents (id TEXT PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE templates (id TEXT PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();

        run_migrations(&pool).await.unwrap();

        assert!(column_exists(&pool, "documents", "metadata").await.unwrap());
        assert!(column_exists(&pool, "templates", "default_risk_level").await.unwrap());
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = crate::db::init_memory_database().await.unwrap();

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }
}
