//! Request templates

use invest_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{now, opt_enum_col, time_col, ts, uuid_col};
use crate::models::Template;

const TEMPLATE_COLUMNS: &str = "id, name, investment_type, description, default_amount, default_currency, \
     default_risk_level, created_by, created_at, updated_at";

fn row_to_template(row: &SqliteRow) -> Result<Template> {
    Ok(Template {
        id: uuid_col(row, "id")?,
        name: row.try_get("name")?,
        investment_type: row.try_get("investment_type")?,
        description: row.try_get("description")?,
        default_amount: row.try_get("default_amount")?,
        default_currency: row.try_get("default_currency")?,
        default_risk_level: opt_enum_col(row, "default_risk_level")?,
        created_by: uuid_col(row, "created_by")?,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
    })
}

pub async fn insert_template(pool: &SqlitePool, template: &Template) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO templates (
            id, name, investment_type, description, default_amount, default_currency,
            default_risk_level, created_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(template.id.to_string())
    .bind(&template.name)
    .bind(&template.investment_type)
    .bind(&template.description)
    .bind(template.default_amount)
    .bind(&template.default_currency)
    .bind(template.default_risk_level.map(|r| r.as_str()))
    .bind(template.created_by.to_string())
    .bind(ts(template.created_at))
    .bind(ts(template.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_template(pool: &SqlitePool, id: Uuid) -> Result<Option<Template>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM templates WHERE id = ? AND deleted_at IS NULL",
        TEMPLATE_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_template).transpose()
}

pub async fn list_templates(pool: &SqlitePool) -> Result<Vec<Template>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM templates WHERE deleted_at IS NULL ORDER BY name",
        TEMPLATE_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_template).collect()
}

pub async fn update_template(pool: &SqlitePool, template: &Template) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE templates
        SET name = ?, investment_type = ?, description = ?, default_amount = ?,
            default_currency = ?, default_risk_level = ?, updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&template.name)
    .bind(&template.investment_type)
    .bind(&template.description)
    .bind(template.default_amount)
    .bind(&template.default_currency)
    .bind(template.default_risk_level.map(|r| r.as_str()))
    .bind(ts(template.updated_at))
    .bind(template.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn soft_delete_template(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let at = ts(now());
    let result = sqlx::query("UPDATE templates SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(&at)
        .bind(&at)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}
