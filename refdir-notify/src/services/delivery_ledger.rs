//! Delivery Ledger
//!
//! One row per confirmed (request, partner) delivery. The unique index is
//! the guard; there is no read-then-write on the write path.

use crate::db::publications;
use crate::utils::retry_on_lock;
use chrono::Utc;
use refdir_common::db::RequestKind;
use refdir_common::Result;
use sqlx::SqlitePool;

/// Result of [`DeliveryLedger::record_delivery`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerWrite {
    Recorded,
    /// Another pass already recorded this pair
    AlreadyDelivered,
}

#[derive(Clone)]
pub struct DeliveryLedger {
    db: SqlitePool,
    max_lock_wait_ms: u64,
}

impl DeliveryLedger {
    pub fn new(db: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            db,
            max_lock_wait_ms,
        }
    }

    pub async fn has_delivered(
        &self,
        kind: RequestKind,
        request_id: &str,
        partner_id: &str,
    ) -> Result<bool> {
        publications::publication_exists(&self.db, kind, request_id, partner_id).await
    }

    /// Record a delivery the platform has already confirmed
    ///
    /// A unique-constraint conflict is `AlreadyDelivered`, not an error.
    pub async fn record_delivery(
        &self,
        kind: RequestKind,
        request_id: &str,
        partner_id: &str,
        message_id: i64,
    ) -> Result<LedgerWrite> {
        let delivered_at = Utc::now();
        let inserted = retry_on_lock("record_delivery", self.max_lock_wait_ms, || {
            publications::insert_publication(
                &self.db,
                kind,
                request_id,
                partner_id,
                message_id,
                delivered_at,
            )
        })
        .await?;

        Ok(if inserted {
            LedgerWrite::Recorded
        } else {
            LedgerWrite::AlreadyDelivered
        })
    }
}
