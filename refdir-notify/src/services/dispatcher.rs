//! Per-Partner Dispatcher
//!
//! Sends one threaded notification per ranked partner, strictly in order.
//! Partner-scoped problems are written to the error log and the loop moves
//! on; nothing here aborts the batch.

use super::delivery_ledger::{DeliveryLedger, LedgerWrite};
use super::error_log::ErrorLog;
use crate::platform::MessagingPlatform;
use refdir_common::db::{ErrorKind, PartnerProfile, Request};
use serde::Serialize;
use std::sync::Arc;

/// What happened to one partner in a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PartnerOutcome {
    Delivered { message_id: i64 },
    /// Ledger already had this pair; nothing sent or counted
    AlreadyDelivered,
    SkippedNoAnchor,
    Failed { error: String },
}

/// A partner that received the notification in this pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifiedPartner {
    pub partner_id: String,
    pub name: String,
    /// Absent when the partner has no card to link to
    pub channel_post_id: Option<i64>,
}

#[derive(Debug, Default)]
pub struct DispatchResult {
    /// One entry per ranked partner, in dispatch order
    pub outcomes: Vec<(String, PartnerOutcome)>,
    pub notified: Vec<NotifiedPartner>,
}

pub struct Dispatcher {
    platform: Arc<dyn MessagingPlatform>,
    ledger: DeliveryLedger,
    error_log: ErrorLog,
    discussion_chat_id: String,
}

impl Dispatcher {
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        ledger: DeliveryLedger,
        error_log: ErrorLog,
        discussion_chat_id: String,
    ) -> Self {
        Self {
            platform,
            ledger,
            error_log,
            discussion_chat_id,
        }
    }

    /// Deliver `body` to every partner in `ranked`, in order
    pub async fn dispatch(
        &self,
        request: &Request,
        ranked: &[PartnerProfile],
        body: &str,
    ) -> DispatchResult {
        let mut result = DispatchResult::default();

        for partner in ranked {
            let outcome = self.dispatch_one(request, partner, body).await;

            if let PartnerOutcome::Delivered { .. } = outcome {
                result.notified.push(NotifiedPartner {
                    partner_id: partner.id.clone(),
                    name: partner.name.clone(),
                    channel_post_id: partner.channel_post_id,
                });
            }
            result.outcomes.push((partner.id.clone(), outcome));
        }

        result
    }

    async fn dispatch_one(
        &self,
        request: &Request,
        partner: &PartnerProfile,
        body: &str,
    ) -> PartnerOutcome {
        match self
            .ledger
            .has_delivered(request.kind, &request.id, &partner.id)
            .await
        {
            Ok(true) => {
                tracing::info!(
                    request_id = %request.id,
                    partner_id = %partner.id,
                    "Partner already notified for this request, skipping"
                );
                return PartnerOutcome::AlreadyDelivered;
            }
            Ok(false) => {}
            // The insert below is still guarded by the unique index
            Err(e) => tracing::warn!(
                request_id = %request.id,
                partner_id = %partner.id,
                error = %e,
                "Ledger check failed, continuing with delivery"
            ),
        }

        let Some(thread_root) = partner.discussion_message_id else {
            tracing::warn!(
                request_id = %request.id,
                partner_id = %partner.id,
                "Partner has no discussion anchor, skipping"
            );
            self.error_log
                .record(
                    ErrorKind::MissingDiscussionAnchor,
                    Some(&partner.id),
                    request.kind,
                    &request.id,
                    format!("Partner {} has no discussion thread", partner.name),
                )
                .await;
            return PartnerOutcome::SkippedNoAnchor;
        };

        if partner.channel_post_id.is_none() {
            self.error_log
                .record(
                    ErrorKind::MissingChannelPost,
                    Some(&partner.id),
                    request.kind,
                    &request.id,
                    format!("Partner {} has no channel post to link", partner.name),
                )
                .await;
        }

        let message_id = match self
            .platform
            .send_threaded_message(&self.discussion_chat_id, thread_root, body)
            .await
        {
            Ok(message_id) => message_id,
            Err(e) => {
                tracing::warn!(
                    request_id = %request.id,
                    partner_id = %partner.id,
                    error = %e,
                    "Failed to notify partner"
                );
                self.error_log
                    .record(
                        ErrorKind::PlatformSendFailed,
                        Some(&partner.id),
                        request.kind,
                        &request.id,
                        e.to_string(),
                    )
                    .await;
                return PartnerOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        match self
            .ledger
            .record_delivery(request.kind, &request.id, &partner.id, message_id)
            .await
        {
            Ok(LedgerWrite::Recorded) => {
                tracing::info!(
                    request_id = %request.id,
                    partner_id = %partner.id,
                    tier = %partner.tier,
                    message_id,
                    "Partner notified"
                );
                PartnerOutcome::Delivered { message_id }
            }
            Ok(LedgerWrite::AlreadyDelivered) => {
                tracing::warn!(
                    request_id = %request.id,
                    partner_id = %partner.id,
                    message_id,
                    "Concurrent pass recorded this partner first"
                );
                PartnerOutcome::AlreadyDelivered
            }
            Err(e) => {
                tracing::error!(
                    request_id = %request.id,
                    partner_id = %partner.id,
                    message_id,
                    error = %e,
                    "Delivered but ledger write failed"
                );
                self.error_log
                    .record(
                        ErrorKind::LedgerWriteFailed,
                        Some(&partner.id),
                        request.kind,
                        &request.id,
                        format!("message {} delivered, ledger write failed: {}", message_id, e),
                    )
                    .await;
                PartnerOutcome::Delivered { message_id }
            }
        }
    }
}
