//! Fan-out engine
//!
//! One pass per newly created order or question:
//! match → rank → dispatch (ledger + error log) → requester summary.
//! The entry point never returns an error; it returns a [`FanOutReport`].

use super::category_matcher::match_partners;
use super::delivery_ledger::DeliveryLedger;
use super::dispatcher::{Dispatcher, NotifiedPartner, PartnerOutcome};
use super::error_log::ErrorLog;
use super::message_format::request_notification;
use super::summarizer::Summarizer;
use super::tier_ranker::rank_partners;
use crate::config::NotifyConfig;
use crate::db::partners;
use crate::platform::MessagingPlatform;
use chrono::Utc;
use refdir_common::db::{Category, ErrorKind, PartnerProfile, Request, RequestKind};
use refdir_common::events::{DirectoryEvent, EventBus};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub const ABORT_IN_PROGRESS: &str = "already in progress";

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Serialize)]
pub struct FanOutReport {
    pub kind: RequestKind,
    pub request_id: String,
    /// Partners linked to any of the request's categories
    pub matched: usize,
    /// Active partners, in dispatch order
    pub ranked: usize,
    pub outcomes: Vec<(String, PartnerOutcome)>,
    pub notified: Vec<NotifiedPartner>,
    pub summary_sent: bool,
    /// Set when the pass stopped before dispatching
    pub aborted: Option<String>,
}

impl FanOutReport {
    fn empty(request: &Request) -> Self {
        Self {
            kind: request.kind,
            request_id: request.id.clone(),
            matched: 0,
            ranked: 0,
            outcomes: Vec::new(),
            notified: Vec::new(),
            summary_sent: false,
            aborted: None,
        }
    }

    pub fn delivered_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, PartnerOutcome::Delivered { .. }))
            .count()
    }

    /// Partners a send was actually attempted for
    pub fn attempted_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| {
                matches!(
                    o,
                    PartnerOutcome::Delivered { .. } | PartnerOutcome::Failed { .. }
                )
            })
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, PartnerOutcome::Failed { .. }))
            .count()
    }
}

type PassKey = (RequestKind, String);

/// Marks a pass as running until dropped
struct InFlight<'a> {
    running: &'a Mutex<HashSet<PassKey>>,
    key: PassKey,
}

impl<'a> InFlight<'a> {
    fn acquire(running: &'a Mutex<HashSet<PassKey>>, key: PassKey) -> Option<Self> {
        let mut set = running.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(key.clone()) {
            return None;
        }
        Some(Self { running, key })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut set = self.running.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.key);
    }
}

pub struct FanOutEngine {
    db: SqlitePool,
    dispatcher: Dispatcher,
    summarizer: Summarizer,
    error_log: ErrorLog,
    event_bus: EventBus,
    running: Mutex<HashSet<PassKey>>,
}

impl FanOutEngine {
    pub fn new(
        db: SqlitePool,
        platform: Arc<dyn MessagingPlatform>,
        config: &NotifyConfig,
        event_bus: EventBus,
    ) -> Self {
        let error_log = ErrorLog::new(db.clone(), event_bus.clone(), config.max_lock_wait_ms);
        let ledger = DeliveryLedger::new(db.clone(), config.max_lock_wait_ms);

        Self {
            dispatcher: Dispatcher::new(
                Arc::clone(&platform),
                ledger,
                error_log.clone(),
                config.discussion_chat_id.clone(),
            ),
            summarizer: Summarizer::new(db.clone(), platform, config.channel.clone()),
            error_log,
            event_bus,
            running: Mutex::new(HashSet::new()),
            db,
        }
    }

    /// Run the fan-out pass for a newly created request
    pub async fn on_request_created(&self, request: &Request) -> FanOutReport {
        let mut report = FanOutReport::empty(request);

        let Some(_in_flight) =
            InFlight::acquire(&self.running, (request.kind, request.id.clone()))
        else {
            tracing::info!(
                kind = %request.kind,
                request_id = %request.id,
                "Fan-out already running for this request, ignoring trigger"
            );
            report.aborted = Some(ABORT_IN_PROGRESS.to_string());
            return report;
        };

        tracing::info!(kind = %request.kind, request_id = %request.id, "Fan-out started");

        let (ranked, categories) = match self.lookup(request, &mut report).await {
            Ok(found) => found,
            Err(message) => {
                tracing::error!(
                    kind = %request.kind,
                    request_id = %request.id,
                    error = %message,
                    "Partner lookup failed, fan-out aborted"
                );
                self.error_log
                    .record(
                        ErrorKind::LookupFailed,
                        None,
                        request.kind,
                        &request.id,
                        message.clone(),
                    )
                    .await;
                report.aborted = Some(format!("lookup failed: {}", message));
                self.announce(&report);
                return report;
            }
        };

        if ranked.is_empty() {
            tracing::info!(
                request_id = %request.id,
                matched = report.matched,
                "No active partners for this request"
            );
            self.announce(&report);
            return report;
        }

        let body = request_notification(request, &categories);
        let dispatched = self.dispatcher.dispatch(request, &ranked, &body).await;
        report.outcomes = dispatched.outcomes;
        report.notified = dispatched.notified;

        report.summary_sent = self.summarizer.summarize(request, &report.notified).await;

        tracing::info!(
            kind = %request.kind,
            request_id = %request.id,
            summary_sent = report.summary_sent,
            "Notifications delivered to {} of {} partners",
            report.delivered_count(),
            report.ranked
        );

        self.announce(&report);
        report
    }

    /// Match and rank; any store error is returned as text
    async fn lookup(
        &self,
        request: &Request,
        report: &mut FanOutReport,
    ) -> Result<(Vec<PartnerProfile>, Vec<Category>), String> {
        let matched = match_partners(&self.db, request)
            .await
            .map_err(|e| e.to_string())?;
        report.matched = matched.partner_ids.len();
        if matched.is_empty() {
            return Ok((Vec::new(), matched.categories));
        }

        let ids: Vec<String> = matched.partner_ids.into_iter().collect();
        let candidates = partners::load_partners(&self.db, &ids)
            .await
            .map_err(|e| e.to_string())?;

        let ranked = rank_partners(candidates);
        report.ranked = ranked.len();
        tracing::debug!(
            request_id = %request.id,
            order = ?ranked.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            "Dispatch order"
        );
        Ok((ranked, matched.categories))
    }

    fn announce(&self, report: &FanOutReport) {
        self.event_bus.emit_lossy(DirectoryEvent::FanOutCompleted {
            request_kind: report.kind,
            request_id: report.request_id.clone(),
            ranked: report.ranked,
            delivered: report.delivered_count(),
            failed: report.failed_count(),
            summary_sent: report.summary_sent,
            aborted: report.aborted.clone(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_released_on_drop() {
        let running = Mutex::new(HashSet::new());
        let key = (RequestKind::Order, "o1".to_string());

        let first = InFlight::acquire(&running, key.clone());
        assert!(first.is_some());
        assert!(InFlight::acquire(&running, key.clone()).is_none());
        assert!(InFlight::acquire(&running, (RequestKind::Question, "o1".to_string())).is_some());

        drop(first);
        assert!(InFlight::acquire(&running, key).is_some());
    }

    #[test]
    fn test_report_counts() {
        let report = FanOutReport {
            kind: RequestKind::Order,
            request_id: "o1".to_string(),
            matched: 4,
            ranked: 4,
            outcomes: vec![
                ("a".to_string(), PartnerOutcome::Delivered { message_id: 1 }),
                ("b".to_string(), PartnerOutcome::Failed { error: "x".to_string() }),
                ("c".to_string(), PartnerOutcome::SkippedNoAnchor),
                ("d".to_string(), PartnerOutcome::AlreadyDelivered),
            ],
            notified: Vec::new(),
            summary_sent: false,
            aborted: None,
        };
        assert_eq!(report.delivered_count(), 1);
        assert_eq!(report.attempted_count(), 2);
        assert_eq!(report.failed_count(), 1);
    }
}
