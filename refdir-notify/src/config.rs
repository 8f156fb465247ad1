//! Configuration resolution for refdir-notify
//!
//! Runtime chat ids resolve with Database → ENV → TOML priority. The bot
//! token never lives in the database, so it resolves ENV → TOML.

use refdir_common::config::{env_value, TomlConfig};
use refdir_common::db::get_setting;
use refdir_common::{Error, Result};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MIN_SEND_INTERVAL_MS: u64 = 50;
const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Broadcast channel that carries partner cards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub chat_id: String,
    /// Public username without the leading `@`, if the channel has one
    pub username: Option<String>,
}

/// Everything the fan-out engine and channel publisher need at runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Chat where channel posts are auto-forwarded and threads live
    pub discussion_chat_id: String,
    pub channel: ChannelConfig,
    /// Upper bound for retrying locked ledger and error-log writes
    pub max_lock_wait_ms: u64,
}

/// Bot API client settings
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub min_send_interval: Duration,
}

/// One runtime setting from its three sources, highest priority first
fn resolve_setting(
    name: &str,
    db_value: Option<String>,
    env_value: Option<String>,
    toml_value: Option<&String>,
) -> Option<String> {
    let toml_value = toml_value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let sources: Vec<&str> = [
        db_value.as_ref().map(|_| "database"),
        env_value.as_ref().map(|_| "environment"),
        toml_value.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {}.",
            name,
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(source) = sources.first() {
        info!("{} loaded from {}", name, source);
    }

    db_value.or(env_value).or(toml_value)
}

/// Resolve the runtime configuration
///
/// **Priority:** Database → ENV (`REFDIR_TELEGRAM_*`) → TOML `[telegram]`
pub async fn resolve_notify_config(db: &SqlitePool, toml: &TomlConfig) -> Result<NotifyConfig> {
    let discussion_chat_id = resolve_setting(
        "telegram_discussion_chat_id",
        get_setting(db, "telegram_discussion_chat_id").await?,
        env_value("REFDIR_TELEGRAM_DISCUSSION_CHAT_ID"),
        toml.telegram.discussion_chat_id.as_ref(),
    )
    .ok_or_else(|| {
        Error::Config(
            "Discussion chat id not configured. Set one of:\n\
             1. settings table: telegram_discussion_chat_id\n\
             2. Environment: REFDIR_TELEGRAM_DISCUSSION_CHAT_ID\n\
             3. TOML config: [telegram] discussion_chat_id"
                .to_string(),
        )
    })?;

    let channel_id = resolve_setting(
        "telegram_channel_id",
        get_setting(db, "telegram_channel_id").await?,
        env_value("REFDIR_TELEGRAM_CHANNEL_ID"),
        toml.telegram.channel_id.as_ref(),
    )
    .ok_or_else(|| {
        Error::Config(
            "Channel id not configured. Set one of:\n\
             1. settings table: telegram_channel_id\n\
             2. Environment: REFDIR_TELEGRAM_CHANNEL_ID\n\
             3. TOML config: [telegram] channel_id"
                .to_string(),
        )
    })?;

    let username = resolve_setting(
        "telegram_channel_username",
        get_setting(db, "telegram_channel_username").await?,
        env_value("REFDIR_TELEGRAM_CHANNEL_USERNAME"),
        toml.telegram.channel_username.as_ref(),
    )
    .map(|u| u.trim_start_matches('@').to_string())
    .filter(|u| !u.is_empty());

    let max_lock_wait_ms = match get_setting(db, "database_max_lock_wait_ms").await? {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid database_max_lock_wait_ms '{}', using default", raw);
            DEFAULT_MAX_LOCK_WAIT_MS
        }),
        None => DEFAULT_MAX_LOCK_WAIT_MS,
    };

    Ok(NotifyConfig {
        discussion_chat_id,
        channel: ChannelConfig {
            chat_id: channel_id,
            username,
        },
        max_lock_wait_ms,
    })
}

/// Resolve Bot API client settings
///
/// **Priority:** ENV `REFDIR_TELEGRAM_BOT_TOKEN` → TOML `[telegram] bot_token`
pub fn resolve_telegram_settings(toml: &TomlConfig) -> Result<TelegramSettings> {
    let bot_token = resolve_setting(
        "Telegram bot token",
        None,
        env_value("REFDIR_TELEGRAM_BOT_TOKEN"),
        toml.telegram.bot_token.as_ref(),
    )
    .ok_or_else(|| {
        Error::Config(
            "Telegram bot token not configured. Set REFDIR_TELEGRAM_BOT_TOKEN \
             or [telegram] bot_token in the TOML config"
                .to_string(),
        )
    })?;

    let api_base_url = toml
        .telegram
        .api_base_url
        .clone()
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string();

    Ok(TelegramSettings {
        bot_token,
        api_base_url,
        request_timeout: Duration::from_secs(
            toml.telegram
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        ),
        min_send_interval: Duration::from_millis(
            toml.telegram
                .min_send_interval_ms
                .unwrap_or(DEFAULT_MIN_SEND_INTERVAL_MS),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_wins_over_env_and_toml() {
        let toml = "toml".to_string();
        let value = resolve_setting(
            "x",
            Some("db".to_string()),
            Some("env".to_string()),
            Some(&toml),
        );
        assert_eq!(value.as_deref(), Some("db"));
    }

    #[test]
    fn test_env_wins_over_toml() {
        let toml = "toml".to_string();
        let value = resolve_setting("x", None, Some("env".to_string()), Some(&toml));
        assert_eq!(value.as_deref(), Some("env"));
    }

    #[test]
    fn test_blank_toml_is_absent() {
        let toml = "   ".to_string();
        assert_eq!(resolve_setting("x", None, None, Some(&toml)), None);
    }

    #[test]
    fn test_telegram_settings_defaults() {
        let mut config = TomlConfig::default();
        config.telegram.bot_token = Some("123:abc".to_string());
        config.telegram.api_base_url = Some("http://localhost:8081/".to_string());

        let settings = resolve_telegram_settings(&config).unwrap();
        assert_eq!(settings.api_base_url, "http://localhost:8081");
        assert_eq!(settings.min_send_interval, Duration::from_millis(50));
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }
}
