//! Database access, one module per table
//!
//! Plain `sqlx` queries. Functions that must run inside a workflow
//! transaction take `&mut SqliteConnection`; single-statement functions are
//! generic over the executor so they work on the pool or a transaction.

pub mod approvals;
pub mod documents;
pub mod jobs;
pub mod notifications;
pub mod requests;
pub mod retry;
pub mod sessions;
pub mod tasks;
pub mod templates;
pub mod users;

pub use retry::retry_on_lock;

use chrono::{DateTime, SubsecRound, Utc};
use invest_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

/// Current time at the precision timestamps are stored with
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn ts(at: DateTime<Utc>) -> String {
    invest_common::time::to_rfc3339(at)
}

pub(crate) fn opt_ts(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(ts)
}

pub(crate) fn uuid_col(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.try_get(column)?;
    Uuid::parse_str(&value)
        .map_err(|e| Error::Internal(format!("Invalid {} '{}': {}", column, value, e)))
}

pub(crate) fn opt_uuid_col(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let value: Option<String> = row.try_get(column)?;
    value
        .map(|v| {
            Uuid::parse_str(&v).map_err(|e| Error::Internal(format!("Invalid {} '{}': {}", column, v, e)))
        })
        .transpose()
}

pub(crate) fn time_col(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let value: String = row.try_get(column)?;
    invest_common::time::parse_rfc3339(&value)
        .ok_or_else(|| Error::Internal(format!("Invalid {} timestamp '{}'", column, value)))
}

pub(crate) fn opt_time_col(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.try_get(column)?;
    value
        .map(|v| {
            invest_common::time::parse_rfc3339(&v)
                .ok_or_else(|| Error::Internal(format!("Invalid {} timestamp '{}'", column, v)))
        })
        .transpose()
}

pub(crate) fn enum_col<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    let value: String = row.try_get(column)?;
    value.parse()
}

pub(crate) fn opt_enum_col<T>(row: &SqliteRow, column: &str) -> Result<Option<T>>
where
    T: FromStr<Err = Error>,
{
    let value: Option<String> = row.try_get(column)?;
    value.map(|v| v.parse()).transpose()
}
