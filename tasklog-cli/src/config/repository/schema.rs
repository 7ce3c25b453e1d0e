//! Field definitions and status vocabulary repository

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use crate::ingest::types::{FieldDefinition, FieldType, StatusDefinition};

/// All field definitions ordered for display
pub async fn list_field_definitions(pool: &SqlitePool) -> Result<Vec<FieldDefinition>> {
    let rows = sqlx::query(
        "SELECT key, title, field_type, required, filterable, sort_order
         FROM task_fields
         ORDER BY sort_order, key",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list task fields")?;

    let mut fields = Vec::with_capacity(rows.len());
    for row in rows {
        let key: String = row.try_get("key")?;
        let type_name: String = row.try_get("field_type")?;
        let field_type = FieldType::parse(&type_name)
            .with_context(|| format!("Unknown type '{}' for field '{}'", type_name, key))?;

        fields.push(FieldDefinition {
            key,
            title: row.try_get("title")?,
            field_type,
            required: row.try_get("required")?,
            filterable: row.try_get("filterable")?,
            order: row.try_get("sort_order")?,
        });
    }

    Ok(fields)
}

pub async fn list_statuses(pool: &SqlitePool) -> Result<Vec<StatusDefinition>> {
    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT title, slug, color FROM statuses ORDER BY rowid")
            .fetch_all(pool)
            .await
            .context("Failed to list statuses")?;

    Ok(rows
        .into_iter()
        .map(|(title, slug, color)| StatusDefinition { title, slug, color })
        .collect())
}

/// Replace the whole schema in one transaction
pub async fn replace_schema(
    pool: &SqlitePool,
    fields: &[FieldDefinition],
    statuses: &[StatusDefinition],
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    sqlx::query("DELETE FROM task_fields")
        .execute(&mut *tx)
        .await
        .context("Failed to clear task fields")?;
    sqlx::query("DELETE FROM statuses")
        .execute(&mut *tx)
        .await
        .context("Failed to clear statuses")?;

    for field in fields {
        sqlx::query(
            "INSERT INTO task_fields (key, title, field_type, required, filterable, sort_order)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&field.key)
        .bind(&field.title)
        .bind(field.field_type.as_str())
        .bind(field.required)
        .bind(field.filterable)
        .bind(field.order)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert field '{}'", field.key))?;
    }

    for status in statuses {
        sqlx::query("INSERT INTO statuses (slug, title, color) VALUES (?, ?, ?)")
            .bind(&status.slug)
            .bind(&status.title)
            .bind(&status.color)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert status '{}'", status.slug))?;
    }

    tx.commit().await.context("Failed to commit schema")?;
    log::info!("Saved {} fields and {} statuses", fields.len(), statuses.len());
    Ok(())
}
