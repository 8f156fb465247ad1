//! Category lookups used by the matcher and the card caption

use refdir_common::db::{Category, RequestKind};
use refdir_common::Result;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::BTreeSet;

/// Explicit category links stored for a request
pub async fn linked_category_ids(
    pool: &SqlitePool,
    kind: RequestKind,
    request_id: &str,
) -> Result<Vec<String>> {
    let sql = match kind {
        RequestKind::Order => {
            "SELECT category_id FROM order_categories WHERE order_id = ? ORDER BY category_id"
        }
        RequestKind::Question => {
            "SELECT category_id FROM question_categories WHERE question_id = ? ORDER BY category_id"
        }
    };

    let ids = sqlx::query_scalar::<_, String>(sql)
        .bind(request_id)
        .fetch_all(pool)
        .await?;

    Ok(ids)
}

/// Load categories by id, returned in the order of `ids`
///
/// Unknown ids are skipped.
pub async fn load_categories(pool: &SqlitePool, ids: &[String]) -> Result<Vec<Category>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id, name FROM categories WHERE id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let rows = query.build().fetch_all(pool).await?;
    let mut found: Vec<Category> = rows
        .iter()
        .map(|row| Category {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect();

    found.sort_by_key(|c| ids.iter().position(|id| id == &c.id));
    Ok(found)
}

/// Every partner profile linked to at least one of `category_ids`
///
/// A partner linked through several of the categories appears once.
pub async fn partner_ids_for_categories(
    pool: &SqlitePool,
    category_ids: &[String],
) -> Result<BTreeSet<String>> {
    if category_ids.is_empty() {
        return Ok(BTreeSet::new());
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT DISTINCT profile_id FROM partner_profile_categories WHERE category_id IN (",
    );
    let mut separated = query.separated(", ");
    for id in category_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let rows = query.build().fetch_all(pool).await?;
    Ok(rows.iter().map(|row| row.get::<String, _>("profile_id")).collect())
}

/// Categories linked to one partner, by name
pub async fn categories_for_partner(pool: &SqlitePool, partner_id: &str) -> Result<Vec<Category>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.name
        FROM categories c
        JOIN partner_profile_categories pc ON pc.category_id = c.id
        WHERE pc.profile_id = ?
        ORDER BY c.name
        "#,
    )
    .bind(partner_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Category {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}
