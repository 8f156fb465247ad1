//! Errors shared by the directory crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Creating the database directory or reading the TOML file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed bootstrap/runtime setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored value outside its allowed set (tier, status, kind)
    #[error("Invalid value: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// SQLite's transient "database is locked" condition
    pub fn is_lock_error(&self) -> bool {
        matches!(self, Error::Database(e) if e.to_string().contains("database is locked"))
    }
}
