//! Bootstrap configuration loading
//!
//! The TOML file carries only what a service needs before it can open the
//! database: where the database lives, where to listen, logging, and the
//! messaging platform credentials. Everything else is a runtime setting in
//! the `settings` table.
//!
//! File resolution order:
//! 1. Explicit path (command-line `--config`)
//! 2. `~/.config/refdir/<file_name>`
//! 3. `/etc/refdir/<file_name>`
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file; defaults to the platform data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP bind host
    #[serde(default)]
    pub host: Option<String>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub telegram: TelegramToml,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[telegram]` table
///
/// Chat ids here are the lowest-priority source; the `settings` table and
/// environment variables override them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramToml {
    pub bot_token: Option<String>,
    pub api_base_url: Option<String>,
    pub channel_id: Option<String>,
    pub channel_username: Option<String>,
    pub discussion_chat_id: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub min_send_interval_ms: Option<u64>,
}

/// Load the bootstrap config, returning the file it came from (if any)
///
/// A missing file is not an error; an unreadable or malformed one is.
pub fn load_toml_config(
    explicit_path: Option<&Path>,
    file_name: &str,
) -> Result<(TomlConfig, Option<PathBuf>)> {
    let path = match explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Some(path.to_path_buf())
        }
        None => find_config_file(file_name),
    };

    let Some(path) = path else {
        info!("No config file found for {}, using built-in defaults", file_name);
        return Ok((TomlConfig::default(), None));
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok((config, Some(path)))
}

/// Candidate config file locations, most specific first
pub fn config_file_candidates(file_name: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("refdir").join(file_name));
    }
    if cfg!(unix) {
        candidates.push(PathBuf::from("/etc/refdir").join(file_name));
    }
    candidates
}

fn find_config_file(file_name: &str) -> Option<PathBuf> {
    config_file_candidates(file_name)
        .into_iter()
        .find(|path| path.exists())
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    let dir = dirs::data_local_dir()
        .map(|d| d.join("refdir"))
        .unwrap_or_else(|| {
            warn!("Could not determine data directory, using ./refdir_data");
            PathBuf::from("./refdir_data")
        });
    dir.join("refdir.db")
}

/// Read a non-blank environment variable
pub fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
