//! Partner profile queries
//!
//! Channel publication state lives entirely in `channel_post_id` (set iff the
//! card is published) plus the `publishing` guard column that keeps two
//! approvals from posting the same card twice.

use refdir_common::db::{PartnerProfile, PartnerStatus, Tier};
use refdir_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

const PARTNER_COLUMNS: &str = "id, user_id, name, status, partner_type, discussion_message_id, \
     channel_post_id, profession, city, phone, tg_channel, website, youtube, rutube, dzen, \
     vk_video, tg_video, self_description, \
     agency_name, agency_description, office_address, photo_url";

fn partner_from_row(row: &SqliteRow) -> Result<PartnerProfile> {
    let status: Option<String> = row.try_get("status")?;
    let tier: Option<String> = row.try_get("partner_type")?;

    Ok(PartnerProfile {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        status: PartnerStatus::from_column(status.as_deref())?,
        tier: Tier::from_column(tier.as_deref())?,
        discussion_message_id: row.try_get("discussion_message_id")?,
        channel_post_id: row.try_get("channel_post_id")?,
        category_ids: Vec::new(),
        profession: super::non_blank(row.try_get("profession")?),
        city: super::non_blank(row.try_get("city")?),
        phone: super::non_blank(row.try_get("phone")?),
        tg_channel: super::non_blank(row.try_get("tg_channel")?),
        website: super::non_blank(row.try_get("website")?),
        youtube: super::non_blank(row.try_get("youtube")?),
        rutube: super::non_blank(row.try_get("rutube")?),
        dzen: super::non_blank(row.try_get("dzen")?),
        vk_video: super::non_blank(row.try_get("vk_video")?),
        tg_video: super::non_blank(row.try_get("tg_video")?),
        self_description: super::non_blank(row.try_get("self_description")?),
        agency_name: super::non_blank(row.try_get("agency_name")?),
        agency_description: super::non_blank(row.try_get("agency_description")?),
        office_address: super::non_blank(row.try_get("office_address")?),
        photo_url: super::non_blank(row.try_get("photo_url")?),
    })
}

/// Load partner profiles by id, with their category links
///
/// Every status is returned; eligibility filtering belongs to the ranker.
/// Row order is unspecified.
pub async fn load_partners(pool: &SqlitePool, ids: &[String]) -> Result<Vec<PartnerProfile>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM partner_profiles WHERE id IN (",
        PARTNER_COLUMNS
    ));
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let rows = query.build().fetch_all(pool).await?;
    let mut partners = rows
        .iter()
        .map(partner_from_row)
        .collect::<Result<Vec<_>>>()?;

    let mut links = category_links(pool, ids).await?;
    for partner in &mut partners {
        partner.category_ids = links.remove(&partner.id).unwrap_or_default();
    }

    Ok(partners)
}

/// Load a single partner profile
pub async fn load_partner(pool: &SqlitePool, id: &str) -> Result<Option<PartnerProfile>> {
    Ok(load_partners(pool, &[id.to_string()]).await?.pop())
}

async fn category_links(
    pool: &SqlitePool,
    ids: &[String],
) -> Result<HashMap<String, Vec<String>>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT profile_id, category_id FROM partner_profile_categories WHERE profile_id IN (",
    );
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(") ORDER BY category_id");

    let rows = query.build().fetch_all(pool).await?;
    let mut links: HashMap<String, Vec<String>> = HashMap::new();
    for row in &rows {
        links
            .entry(row.try_get("profile_id")?)
            .or_default()
            .push(row.try_get("category_id")?);
    }
    Ok(links)
}

/// How long a publishing claim holds before another caller may take it over
///
/// Covers a photo post and a text fallback at the default 30 s platform
/// timeout. A claim without a start time (left by a crashed process from an
/// older schema, or set by hand) is always reclaimable.
pub const PUBLISHING_GUARD_TTL_SECS: i64 = 120;

/// Claim the publishing guard for an unpublished partner
///
/// Returns false when the card is already published or another publish
/// claimed it less than [`PUBLISHING_GUARD_TTL_SECS`] ago. The check and the
/// claim are one statement.
pub async fn begin_publishing(pool: &SqlitePool, id: &str) -> Result<bool> {
    let claimed = sqlx::query(
        r#"
        UPDATE partner_profiles
        SET publishing = 1,
            publishing_since = CURRENT_TIMESTAMP,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
          AND channel_post_id IS NULL
          AND (publishing = 0
               OR publishing_since IS NULL
               OR publishing_since < datetime('now', ?))
        "#,
    )
    .bind(id)
    .bind(format!("-{} seconds", PUBLISHING_GUARD_TTL_SECS))
    .execute(pool)
    .await?
    .rows_affected();

    Ok(claimed == 1)
}

/// Release the publishing guard, storing the new post id when there is one
pub async fn finish_publishing(
    pool: &SqlitePool,
    id: &str,
    channel_post_id: Option<i64>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE partner_profiles
        SET publishing = 0,
            publishing_since = NULL,
            channel_post_id = COALESCE(?, channel_post_id),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(channel_post_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Return a partner to the unpublished state
///
/// Clears the channel post id and the discussion anchor that was derived from
/// it. Only applies if the stored post id still matches `channel_post_id`.
pub async fn clear_channel_post(pool: &SqlitePool, id: &str, channel_post_id: i64) -> Result<bool> {
    let cleared = sqlx::query(
        r#"
        UPDATE partner_profiles
        SET channel_post_id = NULL,
            discussion_message_id = NULL,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND channel_post_id = ?
        "#,
    )
    .bind(id)
    .bind(channel_post_id)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(cleared == 1)
}

/// Attach a discussion thread root to the partner whose card is `channel_post_id`
///
/// Returns the partner id, or None if no partner owns that post.
pub async fn set_discussion_anchor(
    pool: &SqlitePool,
    channel_post_id: i64,
    discussion_message_id: i64,
) -> Result<Option<String>> {
    let partner_id: Option<String> = sqlx::query_scalar(
        r#"
        UPDATE partner_profiles
        SET discussion_message_id = ?, updated_at = CURRENT_TIMESTAMP
        WHERE channel_post_id = ?
        RETURNING id
        "#,
    )
    .bind(discussion_message_id)
    .bind(channel_post_id)
    .fetch_optional(pool)
    .await?;

    Ok(partner_id)
}
