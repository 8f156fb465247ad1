//! Channel Publication State Machine
//!
//! A partner card is Unpublished while `channel_post_id` is NULL and
//! Published once it is set. The `publishing` column guards the
//! Unpublished → Published transition against two concurrent approvals;
//! a claim left behind by a crash expires after
//! [`partners::PUBLISHING_GUARD_TTL_SECS`].

use super::message_format::partner_card_caption;
use crate::config::ChannelConfig;
use crate::db::{categories, partners};
use crate::platform::{MessagingPlatform, PlatformError};
use chrono::Utc;
use refdir_common::db::PartnerProfile;
use refdir_common::events::{DirectoryEvent, EventBus};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

/// Result of a channel publication call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PublicationOutcome {
    Published { channel_post_id: i64 },
    /// Card was already posted; the existing id is returned
    AlreadyPublished { channel_post_id: i64 },
    Updated { channel_post_id: i64, caption_only: bool },
    Removed { channel_post_id: i64 },
    /// Update or delete on a card that is not posted
    NotPublished,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Partner not found: {0}")]
    PartnerNotFound(String),

    #[error("Publication already in progress for partner {0}")]
    InProgress(String),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Database error: {0}")]
    Database(#[from] refdir_common::Error),
}

pub struct ChannelPublisher {
    db: SqlitePool,
    platform: Arc<dyn MessagingPlatform>,
    channel: ChannelConfig,
    event_bus: EventBus,
}

impl ChannelPublisher {
    pub fn new(
        db: SqlitePool,
        platform: Arc<dyn MessagingPlatform>,
        channel: ChannelConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            platform,
            channel,
            event_bus,
        }
    }

    async fn load(&self, partner_id: &str) -> Result<PartnerProfile, PublishError> {
        partners::load_partner(&self.db, partner_id)
            .await?
            .ok_or_else(|| PublishError::PartnerNotFound(partner_id.to_string()))
    }

    async fn caption(&self, partner: &PartnerProfile) -> Result<String, PublishError> {
        let categories = categories::categories_for_partner(&self.db, &partner.id).await?;
        Ok(partner_card_caption(partner, &categories))
    }

    /// Unpublished → Published
    ///
    /// Posts the card (photo when the partner has one, text otherwise) and
    /// stores the new post id. Calling it on a published partner returns the
    /// existing id without posting.
    pub async fn publish_partner(&self, partner_id: &str) -> Result<PublicationOutcome, PublishError> {
        let partner = self.load(partner_id).await?;
        if let Some(channel_post_id) = partner.channel_post_id {
            return Ok(PublicationOutcome::AlreadyPublished { channel_post_id });
        }

        if !partners::begin_publishing(&self.db, partner_id).await? {
            // Lost the race: either published meanwhile or still running
            let current = self.load(partner_id).await?;
            return match current.channel_post_id {
                Some(channel_post_id) => Ok(PublicationOutcome::AlreadyPublished { channel_post_id }),
                None => Err(PublishError::InProgress(partner_id.to_string())),
            };
        }

        let posted = self.post_card(&partner).await;
        let channel_post_id = posted.as_ref().ok().copied();
        if let Err(e) = partners::finish_publishing(&self.db, partner_id, channel_post_id).await {
            // The claim expires on its own; the post itself has to be found by hand
            tracing::error!(
                partner_id = %partner_id,
                channel_post_id = ?channel_post_id,
                error = %e,
                "Failed to store publication result, channel post is untracked"
            );
            return Err(e.into());
        }
        let channel_post_id = posted?;

        tracing::info!(partner_id = %partner_id, channel_post_id, "Partner card published");
        self.event_bus.emit_lossy(DirectoryEvent::ChannelPostPublished {
            partner_id: partner_id.to_string(),
            channel_post_id,
            timestamp: Utc::now(),
        });

        Ok(PublicationOutcome::Published { channel_post_id })
    }

    async fn post_card(&self, partner: &PartnerProfile) -> Result<i64, PublishError> {
        let caption = self.caption(partner).await?;

        if let Some(photo_url) = partner.photo_url.as_deref() {
            match self
                .platform
                .publish_image_post(&self.channel.chat_id, photo_url, &caption)
                .await
            {
                Ok(post_id) => return Ok(post_id),
                Err(e) => tracing::warn!(
                    partner_id = %partner.id,
                    error = %e,
                    "Photo post rejected, publishing text card instead"
                ),
            }
        }

        Ok(self
            .platform
            .publish_text_post(&self.channel.chat_id, &caption)
            .await?)
    }

    /// Published → Published with fresh content
    ///
    /// Replaces image and caption together; if the platform rejects the
    /// image edit the caption is still updated.
    pub async fn update_partner_post(
        &self,
        partner_id: &str,
    ) -> Result<PublicationOutcome, PublishError> {
        let partner = self.load(partner_id).await?;
        let Some(channel_post_id) = partner.channel_post_id else {
            tracing::debug!(partner_id = %partner_id, "Card not published, nothing to update");
            return Ok(PublicationOutcome::NotPublished);
        };

        let caption = self.caption(&partner).await?;
        let chat_id = &self.channel.chat_id;

        let mut caption_only = true;
        if let Some(photo_url) = partner.photo_url.as_deref() {
            match self
                .platform
                .edit_post_image(chat_id, channel_post_id, photo_url, &caption)
                .await
            {
                Ok(()) => caption_only = false,
                Err(e) if e.is_message_gone() => return Err(e.into()),
                Err(e) => tracing::warn!(
                    partner_id = %partner_id,
                    channel_post_id,
                    error = %e,
                    "Image replacement rejected, updating caption only"
                ),
            }
        }

        if caption_only {
            self.platform
                .edit_post_caption(chat_id, channel_post_id, &caption)
                .await?;
        }

        tracing::info!(partner_id = %partner_id, channel_post_id, caption_only, "Partner card updated");
        self.event_bus.emit_lossy(DirectoryEvent::ChannelPostUpdated {
            partner_id: partner_id.to_string(),
            channel_post_id,
            caption_only,
            timestamp: Utc::now(),
        });

        Ok(PublicationOutcome::Updated {
            channel_post_id,
            caption_only,
        })
    }

    /// Published → Unpublished
    ///
    /// A post that is already gone from the channel still clears the id.
    pub async fn delete_partner_post(
        &self,
        partner_id: &str,
    ) -> Result<PublicationOutcome, PublishError> {
        let partner = self.load(partner_id).await?;
        let Some(channel_post_id) = partner.channel_post_id else {
            return Ok(PublicationOutcome::NotPublished);
        };

        match self
            .platform
            .delete_post(&self.channel.chat_id, channel_post_id)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_message_gone() => tracing::warn!(
                partner_id = %partner_id,
                channel_post_id,
                "Channel post already gone, clearing id"
            ),
            Err(e) => return Err(e.into()),
        }

        partners::clear_channel_post(&self.db, partner_id, channel_post_id).await?;

        tracing::info!(partner_id = %partner_id, channel_post_id, "Partner card removed");
        self.event_bus.emit_lossy(DirectoryEvent::ChannelPostRemoved {
            partner_id: partner_id.to_string(),
            channel_post_id,
            timestamp: Utc::now(),
        });

        Ok(PublicationOutcome::Removed { channel_post_id })
    }

    /// Store the discussion thread root created when the channel auto-forwards a card
    pub async fn record_discussion_anchor(
        &self,
        channel_post_id: i64,
        discussion_message_id: i64,
    ) -> Result<Option<String>, PublishError> {
        let partner_id =
            partners::set_discussion_anchor(&self.db, channel_post_id, discussion_message_id)
                .await?;

        match &partner_id {
            Some(id) => {
                tracing::info!(
                    partner_id = %id,
                    channel_post_id,
                    discussion_message_id,
                    "Discussion anchor recorded"
                );
                self.event_bus
                    .emit_lossy(DirectoryEvent::DiscussionAnchorRecorded {
                        partner_id: id.clone(),
                        discussion_message_id,
                        timestamp: Utc::now(),
                    });
            }
            None => tracing::debug!(
                channel_post_id,
                "Auto-forward does not belong to a partner card"
            ),
        }

        Ok(partner_id)
    }
}
