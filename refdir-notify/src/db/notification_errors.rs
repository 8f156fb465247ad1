//! Notification error log

use chrono::Utc;
use refdir_common::db::{NewNotificationError, NotificationErrorRecord, RequestKind};
use refdir_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_timestamp;

const ERROR_COLUMNS: &str =
    "id, error_type, partner_profile_id, entity_type, entity_id, error_message, resolved, created_at";

fn error_from_row(row: &SqliteRow) -> Result<NotificationErrorRecord> {
    let kind: String = row.try_get("error_type")?;
    let entity_type: String = row.try_get("entity_type")?;
    let resolved: i64 = row.try_get("resolved")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(NotificationErrorRecord {
        id: row.try_get("id")?,
        kind: kind.parse()?,
        partner_id: row.try_get("partner_profile_id")?,
        entity_type: entity_type.parse()?,
        entity_id: row.try_get("entity_id")?,
        message: row.try_get("error_message")?,
        resolved: resolved != 0,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

/// Append one error record
pub async fn insert_error(
    pool: &SqlitePool,
    error: &NewNotificationError,
) -> Result<NotificationErrorRecord> {
    let record = NotificationErrorRecord {
        id: Uuid::new_v4().to_string(),
        kind: error.kind,
        partner_id: error.partner_id.clone(),
        entity_type: error.entity_type,
        entity_id: error.entity_id.clone(),
        message: error.message.clone(),
        resolved: false,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO notification_errors
            (id, error_type, partner_profile_id, entity_type, entity_id, error_message, resolved, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&record.id)
    .bind(record.kind.as_str())
    .bind(&record.partner_id)
    .bind(record.entity_type.as_str())
    .bind(&record.entity_id)
    .bind(&record.message)
    .bind(record.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(record)
}

/// Newest-first listing, optionally filtered by resolved flag
pub async fn list_errors(
    pool: &SqlitePool,
    resolved: Option<bool>,
    limit: i64,
) -> Result<Vec<NotificationErrorRecord>> {
    let rows = match resolved {
        Some(flag) => {
            sqlx::query(&format!(
                "SELECT {} FROM notification_errors WHERE resolved = ? ORDER BY created_at DESC, id LIMIT ?",
                ERROR_COLUMNS
            ))
            .bind(flag as i64)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM notification_errors ORDER BY created_at DESC, id LIMIT ?",
                ERROR_COLUMNS
            ))
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(error_from_row).collect()
}

/// Every record logged against one request, oldest first
pub async fn errors_for_entity(
    pool: &SqlitePool,
    entity_type: RequestKind,
    entity_id: &str,
) -> Result<Vec<NotificationErrorRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM notification_errors WHERE entity_type = ? AND entity_id = ? ORDER BY created_at, rowid",
        ERROR_COLUMNS
    ))
    .bind(entity_type.as_str())
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(error_from_row).collect()
}

/// Mark a record resolved; false if the id is unknown
pub async fn resolve_error(pool: &SqlitePool, id: &str) -> Result<bool> {
    let updated = sqlx::query("UPDATE notification_errors SET resolved = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

    Ok(updated == 1)
}
