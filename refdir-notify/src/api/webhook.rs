//! Telegram webhook
//!
//! Two updates matter here. When the broadcast channel auto-forwards a card
//! into the discussion chat, the forwarded copy becomes the partner's thread
//! root. A private `/start` registers the sender so requester summaries can
//! reach them. Everything else is acknowledged and ignored; Telegram always
//! gets 200 so it does not redeliver.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::profiles;
use crate::services::message_format::escape_html;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    #[serde(default)]
    pub is_automatic_forward: bool,
    /// Bot API before 7.0
    pub forward_from_message_id: Option<i64>,
    pub forward_origin: Option<ForwardOrigin>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForwardOrigin {
    #[serde(rename = "type")]
    pub kind: String,
    pub message_id: Option<i64>,
}

impl Message {
    /// Channel post id this message was automatically forwarded from
    fn forwarded_channel_post(&self) -> Option<i64> {
        if !self.is_automatic_forward {
            return None;
        }
        self.forward_origin
            .as_ref()
            .filter(|origin| origin.kind == "channel")
            .and_then(|origin| origin.message_id)
            .or(self.forward_from_message_id)
    }

    fn is_start_command(&self) -> bool {
        self.chat.kind == "private"
            && self
                .text
                .as_deref()
                .map(str::trim)
                .is_some_and(|t| t == "/start" || t.starts_with("/start "))
    }
}

fn chat_matches(configured: &str, chat: &Chat) -> bool {
    let configured = configured.trim();
    match configured.strip_prefix('@') {
        Some(name) => chat.username.as_deref() == Some(name),
        None => configured == chat.id.to_string(),
    }
}

/// POST /telegram/webhook
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Json(update): Json<Update>,
) -> Json<Value> {
    let Some(message) = update.message else {
        tracing::debug!(update_id = update.update_id, "Ignoring update without message");
        return Json(json!({ "ok": true }));
    };

    if chat_matches(&state.config.discussion_chat_id, &message.chat) {
        if let Some(channel_post_id) = message.forwarded_channel_post() {
            if let Err(e) = state
                .publisher
                .record_discussion_anchor(channel_post_id, message.message_id)
                .await
            {
                tracing::error!(
                    channel_post_id,
                    discussion_message_id = message.message_id,
                    error = %e,
                    "Failed to record discussion anchor"
                );
            }
        }
        return Json(json!({ "ok": true }));
    }

    if message.is_start_command() {
        if let Some(user) = &message.from {
            handle_start(&state, user).await;
        }
    }

    Json(json!({ "ok": true }))
}

async fn handle_start(state: &AppState, user: &User) {
    match profiles::upsert_telegram_profile(
        &state.db,
        user.id,
        user.username.as_deref(),
        user.first_name.as_deref(),
    )
    .await
    {
        Ok(profile_id) => {
            tracing::info!(telegram_id = user.id, profile_id = %profile_id, "Requester registered")
        }
        Err(e) => {
            tracing::error!(telegram_id = user.id, error = %e, "Failed to register requester");
            return;
        }
    }

    let greeting = match user.first_name.as_deref() {
        Some(name) => format!("👋 <b>Hello, {}!</b>", escape_html(name)),
        None => "👋 <b>Hello!</b>".to_string(),
    };
    let text = format!(
        "{}\n\nYou will get a message here with partner links whenever your order or question is sent out.",
        greeting
    );

    if let Err(e) = state.platform.send_direct_message(user.id, &text).await {
        tracing::warn!(telegram_id = user.id, error = %e, "Failed to send welcome message");
    }
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/telegram/webhook", post(telegram_webhook))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Message {
        serde_json::from_str::<Update>(json).unwrap().message.unwrap()
    }

    #[test]
    fn test_forward_origin_channel() {
        let message = parse(
            r#"{"update_id":1,"message":{"message_id":900,"chat":{"id":-1002,"type":"supergroup"},
                "is_automatic_forward":true,
                "forward_origin":{"type":"channel","chat":{"id":-1001,"type":"channel"},"message_id":55,"date":0}}}"#,
        );
        assert_eq!(message.forwarded_channel_post(), Some(55));
    }

    #[test]
    fn test_legacy_forward_field() {
        let message = parse(
            r#"{"update_id":1,"message":{"message_id":900,"chat":{"id":-1002,"type":"supergroup"},
                "is_automatic_forward":true,"forward_from_message_id":56}}"#,
        );
        assert_eq!(message.forwarded_channel_post(), Some(56));
    }

    #[test]
    fn test_manual_forward_ignored() {
        let message = parse(
            r#"{"update_id":1,"message":{"message_id":900,"chat":{"id":-1002,"type":"supergroup"},
                "forward_from_message_id":56}}"#,
        );
        assert_eq!(message.forwarded_channel_post(), None);
    }

    #[test]
    fn test_start_command_private_only() {
        let private = parse(
            r#"{"update_id":1,"message":{"message_id":1,"chat":{"id":5,"type":"private"},"text":"/start ref"}}"#,
        );
        assert!(private.is_start_command());

        let group = parse(
            r#"{"update_id":1,"message":{"message_id":1,"chat":{"id":-5,"type":"group"},"text":"/start"}}"#,
        );
        assert!(!group.is_start_command());
    }

    #[test]
    fn test_chat_matches() {
        let chat = Chat {
            id: -1002,
            kind: "supergroup".to_string(),
            username: Some("refdir_talk".to_string()),
        };
        assert!(chat_matches("-1002", &chat));
        assert!(chat_matches("@refdir_talk", &chat));
        assert!(!chat_matches("-1003", &chat));
    }
}
