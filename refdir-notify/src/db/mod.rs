//! Database access for refdir-notify
//!
//! Free functions over the shared `SqlitePool`. Schema creation lives in
//! `refdir_common::db::init`.

pub mod categories;
pub mod notification_errors;
pub mod partners;
pub mod profiles;
pub mod publications;
pub mod requests;

use chrono::{DateTime, NaiveDateTime, Utc};
use refdir_common::{Error, Result};

/// Parse a timestamp column written either as RFC 3339 or by SQLite's CURRENT_TIMESTAMP
pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

/// Trim a nullable text column, mapping blank values to None
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        let a = parse_timestamp("t", "2026-03-01T10:00:00Z").unwrap();
        let b = parse_timestamp("t", "2026-03-01 10:00:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("t", "yesterday").is_err());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(" Kyiv ".to_string())).as_deref(), Some("Kyiv"));
        assert_eq!(non_blank(None), None);
    }
}
