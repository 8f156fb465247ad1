//! Order and question loading

use refdir_common::db::{Request, RequestKind};
use refdir_common::Result;
use sqlx::{Row, SqlitePool};

use super::{categories, non_blank, parse_timestamp};

/// Load one order or question, including its explicit category links
pub async fn load_request(
    pool: &SqlitePool,
    kind: RequestKind,
    id: &str,
) -> Result<Option<Request>> {
    let sql = match kind {
        RequestKind::Order => {
            r#"
            SELECT id, user_id, category_id, title, text, city, budget, contact,
                   NULL AS details, status,
                   CAST(created_at AS TEXT) AS created_at
            FROM orders WHERE id = ?
            "#
        }
        RequestKind::Question => {
            r#"
            SELECT id, user_id, category_id, NULL AS title, text, NULL AS city,
                   NULL AS budget, NULL AS contact, details, status,
                   CAST(created_at AS TEXT) AS created_at
            FROM questions WHERE id = ?
            "#
        }
    };

    let Some(row) = sqlx::query(sql).bind(id).fetch_optional(pool).await? else {
        return Ok(None);
    };

    let created_at: Option<String> = row.try_get("created_at")?;
    let created_at = created_at
        .map(|s| parse_timestamp("created_at", &s))
        .transpose()?;

    let mut request = Request {
        kind,
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        category_id: row.try_get("category_id")?,
        extra_category_ids: Vec::new(),
        title: non_blank(row.try_get("title")?),
        text: row.try_get("text")?,
        city: non_blank(row.try_get("city")?),
        budget: non_blank(row.try_get("budget")?),
        contact: non_blank(row.try_get("contact")?),
        details: non_blank(row.try_get("details")?),
        status: row.try_get("status")?,
        created_at,
    };

    request.extra_category_ids = categories::linked_category_ids(pool, kind, id)
        .await?
        .into_iter()
        .filter(|c| c != &request.category_id)
        .collect();

    Ok(Some(request))
}
