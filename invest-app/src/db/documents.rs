//! Uploaded documents and their analysis results

use invest_common::Result;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{enum_col, now, time_col, ts, uuid_col};
use crate::models::{AnalysisStatus, Document};

const DOCUMENT_COLUMNS: &str = "id, request_id, original_filename, stored_path, mime_type, size_bytes, \
     uploaded_by, analysis_status, openai_file_id, vector_store_file_id, summary, insights, metadata, \
     created_at, updated_at";

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let metadata: Option<String> = row.try_get("metadata")?;
    let metadata = metadata
        .map(|m| serde_json::from_str::<Value>(&m))
        .transpose()?;

    Ok(Document {
        id: uuid_col(row, "id")?,
        request_id: uuid_col(row, "request_id")?,
        original_filename: row.try_get("original_filename")?,
        stored_path: row.try_get("stored_path")?,
        mime_type: row.try_get("mime_type")?,
        size_bytes: row.try_get("size_bytes")?,
        uploaded_by: uuid_col(row, "uploaded_by")?,
        analysis_status: enum_col(row, "analysis_status")?,
        openai_file_id: row.try_get("openai_file_id")?,
        vector_store_file_id: row.try_get("vector_store_file_id")?,
        summary: row.try_get("summary")?,
        insights: row.try_get("insights")?,
        metadata,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
    })
}

pub async fn insert_document<'e, E>(executor: E, document: &Document) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO documents (
            id, request_id, original_filename, stored_path, mime_type, size_bytes,
            uploaded_by, analysis_status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(document.id.to_string())
    .bind(document.request_id.to_string())
    .bind(&document.original_filename)
    .bind(&document.stored_path)
    .bind(&document.mime_type)
    .bind(document.size_bytes)
    .bind(document.uploaded_by.to_string())
    .bind(document.analysis_status.as_str())
    .bind(ts(document.created_at))
    .bind(ts(document.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn get_document(pool: &SqlitePool, id: Uuid) -> Result<Option<Document>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM documents WHERE id = ? AND deleted_at IS NULL",
        DOCUMENT_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_document).transpose()
}

pub async fn list_documents_for_request(pool: &SqlitePool, request_id: Uuid) -> Result<Vec<Document>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM documents WHERE request_id = ? AND deleted_at IS NULL ORDER BY created_at",
        DOCUMENT_COLUMNS
    ))
    .bind(request_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_document).collect()
}

/// Provider file ids of the request's vectorized documents
pub async fn vectorized_file_ids(pool: &SqlitePool, request_id: Uuid) -> Result<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT openai_file_id FROM documents
        WHERE request_id = ? AND deleted_at IS NULL
          AND openai_file_id IS NOT NULL AND vector_store_file_id IS NOT NULL
        ORDER BY created_at
        "#,
    )
    .bind(request_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

pub async fn soft_delete_document(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let at = ts(now());
    let result = sqlx::query("UPDATE documents SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(&at)
        .bind(&at)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_analysis_status(pool: &SqlitePool, id: Uuid, status: AnalysisStatus) -> Result<()> {
    sqlx::query("UPDATE documents SET analysis_status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(ts(now()))
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_openai_file_id(pool: &SqlitePool, id: Uuid, file_id: &str) -> Result<()> {
    sqlx::query("UPDATE documents SET openai_file_id = ?, updated_at = ? WHERE id = ?")
        .bind(file_id)
        .bind(ts(now()))
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Record vectorization together with the attributes the file was indexed with
pub async fn set_vector_store_file(
    pool: &SqlitePool,
    id: Uuid,
    vector_store_file_id: &str,
    metadata: &Value,
) -> Result<()> {
    sqlx::query("UPDATE documents SET vector_store_file_id = ?, metadata = ?, updated_at = ? WHERE id = ?")
        .bind(vector_store_file_id)
        .bind(serde_json::to_string(metadata)?)
        .bind(ts(now()))
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_summary(pool: &SqlitePool, id: Uuid, summary: &str) -> Result<()> {
    sqlx::query("UPDATE documents SET summary = ?, updated_at = ? WHERE id = ?")
        .bind(summary)
        .bind(ts(now()))
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_insights(pool: &SqlitePool, id: Uuid, insights: &str) -> Result<()> {
    sqlx::query("UPDATE documents SET insights = ?, updated_at = ? WHERE id = ?")
        .bind(insights)
        .bind(ts(now()))
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
