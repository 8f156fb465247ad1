//! Requester contact addresses

use refdir_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Platform chat id of a mini-app user, if they ever started the bot
pub async fn telegram_id_for_user(pool: &SqlitePool, user_id: &str) -> Result<Option<i64>> {
    let telegram_id: Option<Option<i64>> =
        sqlx::query_scalar("SELECT telegram_id FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(telegram_id.flatten())
}

/// Create or refresh the profile for a platform user, returning the profile id
pub async fn upsert_telegram_profile(
    pool: &SqlitePool,
    telegram_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
) -> Result<String> {
    let id: String = sqlx::query_scalar(
        r#"
        INSERT INTO profiles (id, telegram_id, username, first_name)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(telegram_id) DO UPDATE SET
            username = excluded.username,
            first_name = excluded.first_name,
            updated_at = CURRENT_TIMESTAMP
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(telegram_id)
    .bind(username)
    .bind(first_name)
    .fetch_one(pool)
    .await?;

    Ok(id)
}
