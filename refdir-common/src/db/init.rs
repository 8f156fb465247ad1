//! Database initialization
//!
//! Creates the directory schema on first run and opens it on every later run.
//! All statements are idempotent, so calling [`init_database`] repeatedly is safe.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas on the connect options apply to every pooled connection
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create every directory table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_categories_table(pool).await?;
    create_profiles_table(pool).await?;
    create_partner_tables(pool).await?;
    create_request_tables(pool).await?;
    create_publications_table(pool).await?;
    create_notification_errors_table(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_categories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Platform contact address for each user of the mini-app
async fn create_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            telegram_id INTEGER UNIQUE,
            username TEXT,
            first_name TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_partner_tables(pool: &SqlitePool) -> Result<()> {
    // `publishing` is the in-progress guard for channel publication
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS partner_profiles (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            status TEXT CHECK (status IS NULL OR status IN ('active', 'inactive', 'archived')),
            partner_type TEXT CHECK (partner_type IS NULL OR partner_type IN ('star', 'paid', 'free')),
            discussion_message_id INTEGER,
            channel_post_id INTEGER,
            publishing INTEGER NOT NULL DEFAULT 0,
            publishing_since TIMESTAMP,
            profession TEXT,
            city TEXT,
            phone TEXT,
            tg_channel TEXT,
            website TEXT,
            youtube TEXT,
            rutube TEXT,
            dzen TEXT,
            vk_video TEXT,
            tg_video TEXT,
            self_description TEXT,
            agency_name TEXT,
            agency_description TEXT,
            office_address TEXT,
            photo_url TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_partner_profiles_channel_post ON partner_profiles(channel_post_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS partner_profile_categories (
            profile_id TEXT NOT NULL REFERENCES partner_profiles(id) ON DELETE CASCADE,
            category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            PRIMARY KEY (profile_id, category_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_partner_profile_categories_category ON partner_profile_categories(category_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_request_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            category_id TEXT NOT NULL REFERENCES categories(id),
            title TEXT,
            text TEXT NOT NULL,
            city TEXT,
            budget TEXT,
            contact TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS order_categories (
            order_id TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            PRIMARY KEY (order_id, category_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            category_id TEXT NOT NULL REFERENCES categories(id),
            text TEXT NOT NULL,
            details TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS question_categories (
            question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            PRIMARY KEY (question_id, category_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Delivery ledger
///
/// The unique index is the only guard against duplicate rows under
/// concurrent fan-out passes; writers rely on it rather than reading first.
async fn create_publications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS publications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            request_kind TEXT NOT NULL CHECK (request_kind IN ('order', 'question')),
            request_id TEXT NOT NULL,
            partner_profile_id TEXT NOT NULL REFERENCES partner_profiles(id),
            message_id INTEGER NOT NULL,
            delivered_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_publications_request_partner
        ON publications(request_kind, request_id, partner_profile_id)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_notification_errors_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notification_errors (
            id TEXT PRIMARY KEY,
            error_type TEXT NOT NULL,
            partner_profile_id TEXT,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            error_message TEXT,
            resolved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_notification_errors_entity ON notification_errors(entity_type, entity_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or repair default settings
///
/// Channel and discussion chat ids have no sensible default; they are created
/// empty so operators can find the keys, and resolution falls through to
/// environment and TOML while they stay empty.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "telegram_channel_id", "").await?;
    ensure_setting(pool, "telegram_channel_username", "").await?;
    ensure_setting(pool, "telegram_discussion_chat_id", "").await?;
    ensure_setting(pool, "database_max_lock_wait_ms", "5000").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Create `key` with `default_value`, or restore the default over a NULL value
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE tolerates two services initializing at once
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        return Ok(());
    }

    let reset = sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?
        .rows_affected();

    if reset > 0 {
        warn!("Setting '{}' was NULL, reset to default: {:?}", key, default_value);
    }

    Ok(())
}

/// Read one setting, treating NULL and blank values as absent
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value
        .flatten()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Insert or replace one setting
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}
