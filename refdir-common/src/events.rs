//! Event types for the refdir event system
//!
//! Provides the shared event definitions and the EventBus used to surface
//! fan-out and channel publication activity to live observers (SSE).

use crate::db::{ErrorKind, RequestKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Directory event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DirectoryEvent {
    /// A fan-out pass finished (including passes that matched nobody)
    FanOutCompleted {
        request_kind: RequestKind,
        request_id: String,
        /// Active partners in dispatch order
        ranked: usize,
        /// Partners whose delivery was confirmed in this pass
        delivered: usize,
        /// Partners whose send failed in this pass
        failed: usize,
        summary_sent: bool,
        /// Present when the pass stopped before dispatch
        aborted: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A row was appended to the notification error log
    NotificationErrorRecorded {
        kind: ErrorKind,
        partner_id: Option<String>,
        entity_type: RequestKind,
        entity_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Partner card posted to the broadcast channel
    ChannelPostPublished {
        partner_id: String,
        channel_post_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// Partner card edited in place
    ChannelPostUpdated {
        partner_id: String,
        channel_post_id: i64,
        /// True when the image edit was rejected and only the caption changed
        caption_only: bool,
        timestamp: DateTime<Utc>,
    },

    /// Partner card deleted from the channel
    ChannelPostRemoved {
        partner_id: String,
        channel_post_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// Discussion thread root captured for a partner card
    DiscussionAnchorRecorded {
        partner_id: String,
        discussion_message_id: i64,
        timestamp: DateTime<Utc>,
    },
}

impl DirectoryEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            DirectoryEvent::FanOutCompleted { .. } => "FanOutCompleted",
            DirectoryEvent::NotificationErrorRecorded { .. } => "NotificationErrorRecorded",
            DirectoryEvent::ChannelPostPublished { .. } => "ChannelPostPublished",
            DirectoryEvent::ChannelPostUpdated { .. } => "ChannelPostUpdated",
            DirectoryEvent::ChannelPostRemoved { .. } => "ChannelPostRemoved",
            DirectoryEvent::DiscussionAnchorRecorded { .. } => "DiscussionAnchorRecorded",
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lose the
/// oldest events once `capacity` is exceeded.
///
/// # Examples
///
/// ```
/// use refdir_common::events::{DirectoryEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(DirectoryEvent::ChannelPostRemoved {
///     partner_id: "p1".to_string(),
///     channel_post_id: 42,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DirectoryEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: DirectoryEvent,
    ) -> Result<usize, broadcast::error::SendError<DirectoryEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DirectoryEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let count = bus
            .emit(DirectoryEvent::ChannelPostPublished {
                partner_id: "p1".to_string(),
                channel_post_id: 7,
                timestamp: Utc::now(),
            })
            .unwrap();
        assert_eq!(count, 1);

        match rx.recv().await.unwrap() {
            DirectoryEvent::ChannelPostPublished { channel_post_id, .. } => {
                assert_eq!(channel_post_id, 7)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        let event = DirectoryEvent::ChannelPostRemoved {
            partner_id: "p1".to_string(),
            channel_post_id: 7,
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DirectoryEvent::FanOutCompleted {
            request_kind: RequestKind::Order,
            request_id: "o1".to_string(),
            ranked: 3,
            delivered: 2,
            failed: 1,
            summary_sent: true,
            aborted: None,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "FanOutCompleted");
        assert_eq!(json["request_kind"], "order");
        assert_eq!(event.event_type(), "FanOutCompleted");
    }
}
