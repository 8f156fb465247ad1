//! Requester Summarizer
//!
//! Best effort: every failure here is logged and reported as "not sent".

use super::dispatcher::NotifiedPartner;
use super::message_format::{requester_summary, SummaryLink};
use crate::config::ChannelConfig;
use crate::db::profiles;
use crate::platform::MessagingPlatform;
use refdir_common::db::Request;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Public link to a post in the broadcast channel
///
/// Uses the channel username when known, otherwise the private `t.me/c/`
/// form, which needs a `-100`-prefixed numeric chat id.
pub fn deep_link(channel: &ChannelConfig, post_id: i64) -> Option<String> {
    let username = channel
        .username
        .as_deref()
        .or_else(|| channel.chat_id.trim().strip_prefix('@'))
        .filter(|u| !u.is_empty());
    if let Some(username) = username {
        return Some(format!("https://t.me/{}/{}", username, post_id));
    }

    let internal = channel.chat_id.trim().strip_prefix("-100")?;
    if internal.is_empty() || !internal.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("https://t.me/c/{}/{}", internal, post_id))
}

pub struct Summarizer {
    db: SqlitePool,
    platform: Arc<dyn MessagingPlatform>,
    channel: ChannelConfig,
}

impl Summarizer {
    pub fn new(db: SqlitePool, platform: Arc<dyn MessagingPlatform>, channel: ChannelConfig) -> Self {
        Self {
            db,
            platform,
            channel,
        }
    }

    /// Send the single summary message for a finished pass
    ///
    /// Returns true only if the message was sent. Does nothing when nobody
    /// was notified.
    pub async fn summarize(&self, request: &Request, notified: &[NotifiedPartner]) -> bool {
        if notified.is_empty() {
            return false;
        }

        let chat_id = match profiles::telegram_id_for_user(&self.db, &request.user_id).await {
            Ok(Some(chat_id)) => chat_id,
            Ok(None) => {
                tracing::info!(
                    request_id = %request.id,
                    user_id = %request.user_id,
                    "Requester has no platform contact, summary not sent"
                );
                return false;
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request.id,
                    error = %e,
                    "Failed to resolve requester contact, summary not sent"
                );
                return false;
            }
        };

        let links: Vec<SummaryLink> = notified
            .iter()
            .filter_map(|partner| {
                let post_id = partner.channel_post_id?;
                match deep_link(&self.channel, post_id) {
                    Some(url) => Some(SummaryLink {
                        name: partner.name.clone(),
                        url,
                    }),
                    None => {
                        tracing::warn!(
                            partner_id = %partner.partner_id,
                            channel_id = %self.channel.chat_id,
                            "Cannot build channel link for partner"
                        );
                        None
                    }
                }
            })
            .collect();

        let text = requester_summary(request.kind, notified.len(), &links);

        match self.platform.send_direct_message(chat_id, &text).await {
            Ok(_) => {
                tracing::info!(
                    request_id = %request.id,
                    links = links.len(),
                    "Requester summary sent"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request.id,
                    error = %e,
                    "Failed to send requester summary"
                );
                false
            }
        }
    }
}
