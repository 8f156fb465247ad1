//! Messaging platform boundary
//!
//! The fan-out engine and the channel publisher only talk to the platform
//! through [`MessagingPlatform`]. Production uses [`telegram::TelegramClient`];
//! tests substitute a scripted fake.

pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

pub use telegram::TelegramClient;

/// Messaging platform errors
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl PlatformError {
    fn description_contains(&self, needle: &str) -> bool {
        match self {
            PlatformError::Api { description, .. } => description.to_lowercase().contains(needle),
            _ => false,
        }
    }

    /// The target message no longer exists on the platform
    pub fn is_message_gone(&self) -> bool {
        self.description_contains("message to delete not found")
            || self.description_contains("message to edit not found")
            || self.description_contains("message not found")
    }

    /// An edit was rejected because nothing changed
    pub fn is_not_modified(&self) -> bool {
        self.description_contains("message is not modified")
    }
}

/// Outbound operations the directory needs from a chat platform
///
/// Chat ids are passed as configured (numeric id or `@username`). Message ids
/// are the platform's per-chat integers.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Reply under `thread_root` in `chat_id`; returns the new message id
    async fn send_threaded_message(
        &self,
        chat_id: &str,
        thread_root: i64,
        text: &str,
    ) -> Result<i64, PlatformError>;

    /// Private message to a user; returns the new message id
    async fn send_direct_message(&self, user_chat_id: i64, text: &str)
        -> Result<i64, PlatformError>;

    /// Photo post with caption; returns the post's message id
    async fn publish_image_post(
        &self,
        chat_id: &str,
        image_url: &str,
        caption: &str,
    ) -> Result<i64, PlatformError>;

    /// Text-only post; returns the post's message id
    async fn publish_text_post(&self, chat_id: &str, text: &str) -> Result<i64, PlatformError>;

    /// Replace image and caption of an existing post in one call
    async fn edit_post_image(
        &self,
        chat_id: &str,
        message_id: i64,
        image_url: &str,
        caption: &str,
    ) -> Result<(), PlatformError>;

    /// Replace only the caption (or the text of a text-only post)
    async fn edit_post_caption(
        &self,
        chat_id: &str,
        message_id: i64,
        caption: &str,
    ) -> Result<(), PlatformError>;

    async fn delete_post(&self, chat_id: &str, message_id: i64) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(description: &str) -> PlatformError {
        PlatformError::Api {
            code: 400,
            description: description.to_string(),
        }
    }

    #[test]
    fn test_message_gone_detection() {
        assert!(api("Bad Request: message to delete not found").is_message_gone());
        assert!(api("Bad Request: MESSAGE_ID_INVALID message not found").is_message_gone());
        assert!(!api("Bad Request: chat not found").is_message_gone());
        assert!(!PlatformError::Timeout.is_message_gone());
    }

    #[test]
    fn test_not_modified_detection() {
        assert!(api("Bad Request: message is not modified: specified new message content and reply markup are exactly the same").is_not_modified());
        assert!(!api("Bad Request: wrong file identifier").is_not_modified());
    }
}
