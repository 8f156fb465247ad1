//! Notification error log writer
//!
//! Appends typed error records and announces them on the event bus. Writing
//! the log never fails the caller: a record that cannot be stored is logged
//! through tracing instead.

use crate::db::notification_errors;
use crate::utils::retry_on_lock;
use chrono::Utc;
use refdir_common::db::{ErrorKind, NewNotificationError, RequestKind};
use refdir_common::events::{DirectoryEvent, EventBus};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct ErrorLog {
    db: SqlitePool,
    event_bus: EventBus,
    max_lock_wait_ms: u64,
}

impl ErrorLog {
    pub fn new(db: SqlitePool, event_bus: EventBus, max_lock_wait_ms: u64) -> Self {
        Self {
            db,
            event_bus,
            max_lock_wait_ms,
        }
    }

    pub async fn record(
        &self,
        kind: ErrorKind,
        partner_id: Option<&str>,
        entity_type: RequestKind,
        entity_id: &str,
        message: impl Into<String>,
    ) {
        let error = NewNotificationError {
            kind,
            partner_id: partner_id.map(str::to_string),
            entity_type,
            entity_id: entity_id.to_string(),
            message: Some(message.into()),
        };

        let stored = retry_on_lock("record_notification_error", self.max_lock_wait_ms, || {
            notification_errors::insert_error(&self.db, &error)
        })
        .await;

        match stored {
            Ok(record) => {
                tracing::debug!(
                    error_id = %record.id,
                    kind = %kind,
                    entity_id = %entity_id,
                    "Notification error recorded"
                );
                self.event_bus
                    .emit_lossy(DirectoryEvent::NotificationErrorRecorded {
                        kind,
                        partner_id: error.partner_id.clone(),
                        entity_type,
                        entity_id: error.entity_id.clone(),
                        timestamp: Utc::now(),
                    });
            }
            Err(e) => {
                tracing::error!(
                    kind = %kind,
                    partner_id = ?error.partner_id,
                    entity_id = %entity_id,
                    message = ?error.message,
                    error = %e,
                    "Failed to store notification error record"
                );
            }
        }
    }
}
