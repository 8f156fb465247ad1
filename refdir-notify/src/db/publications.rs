//! Delivery ledger rows

use chrono::{DateTime, Utc};
use refdir_common::db::{PublicationRecord, RequestKind};
use refdir_common::Result;
use sqlx::{Row, SqlitePool};

use super::parse_timestamp;

/// Insert a ledger row unless one exists for (kind, request, partner)
///
/// Returns true if this call created the row. Relies on the unique index, so
/// two concurrent callers cannot both get true.
pub async fn insert_publication(
    pool: &SqlitePool,
    kind: RequestKind,
    request_id: &str,
    partner_id: &str,
    message_id: i64,
    delivered_at: DateTime<Utc>,
) -> Result<bool> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO publications (request_kind, request_id, partner_profile_id, message_id, delivered_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(request_kind, request_id, partner_profile_id) DO NOTHING
        "#,
    )
    .bind(kind.as_str())
    .bind(request_id)
    .bind(partner_id)
    .bind(message_id)
    .bind(delivered_at.to_rfc3339())
    .execute(pool)
    .await?
    .rows_affected();

    Ok(inserted == 1)
}

pub async fn publication_exists(
    pool: &SqlitePool,
    kind: RequestKind,
    request_id: &str,
    partner_id: &str,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM publications
            WHERE request_kind = ? AND request_id = ? AND partner_profile_id = ?
        )
        "#,
    )
    .bind(kind.as_str())
    .bind(request_id)
    .bind(partner_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// All ledger rows for one request, oldest first
pub async fn list_publications(
    pool: &SqlitePool,
    kind: RequestKind,
    request_id: &str,
) -> Result<Vec<PublicationRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT request_kind, request_id, partner_profile_id, message_id, delivered_at
        FROM publications
        WHERE request_kind = ? AND request_id = ?
        ORDER BY id
        "#,
    )
    .bind(kind.as_str())
    .bind(request_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let request_kind: String = row.try_get("request_kind")?;
            let delivered_at: String = row.try_get("delivered_at")?;
            Ok(PublicationRecord {
                request_kind: request_kind.parse()?,
                request_id: row.try_get("request_id")?,
                partner_id: row.try_get("partner_profile_id")?,
                message_id: row.try_get("message_id")?,
                delivered_at: parse_timestamp("delivered_at", &delivered_at)?,
            })
        })
        .collect()
}
