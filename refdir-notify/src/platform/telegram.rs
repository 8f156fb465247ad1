//! Telegram Bot API client
//!
//! JSON over HTTPS with a minimum interval between calls. Every method
//! returns the Bot API's `{ok, result, description, error_code}` envelope
//! mapped onto [`PlatformError`].

use super::{MessagingPlatform, PlatformError};
use crate::config::TelegramSettings;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const USER_AGENT: &str = concat!("refdir-notify/", env!("CARGO_PKG_VERSION"));

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Rate limiter enforcing a minimum interval between calls
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait if necessary to comply with rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Numeric chat ids go out as JSON numbers, `@channel` names as strings
fn chat_id_value(chat_id: &str) -> Value {
    match chat_id.trim().parse::<i64>() {
        Ok(id) => json!(id),
        Err(_) => json!(chat_id.trim()),
    }
}

/// Decode a Bot API response body
fn decode_response<T: DeserializeOwned>(
    http_status: u16,
    body: &str,
) -> Result<T, PlatformError> {
    let envelope: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&http_status) => {
            return Err(PlatformError::Parse(e.to_string()))
        }
        Err(_) => {
            return Err(PlatformError::Api {
                code: i64::from(http_status),
                description: body.chars().take(200).collect(),
            })
        }
    };

    if !envelope.ok {
        return Err(PlatformError::Api {
            code: envelope.error_code.unwrap_or(i64::from(http_status)),
            description: envelope
                .description
                .unwrap_or_else(|| "no description".to_string()),
        });
    }

    envelope
        .result
        .ok_or_else(|| PlatformError::Parse("ok response without result".to_string()))
}

/// Telegram Bot API client
pub struct TelegramClient {
    http_client: reqwest::Client,
    /// `<api_base_url>/bot<token>`
    endpoint: String,
    rate_limiter: Arc<RateLimiter>,
}

impl TelegramClient {
    pub fn new(settings: &TelegramSettings) -> Result<Self, PlatformError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/bot{}", settings.api_base_url, settings.bot_token),
            rate_limiter: Arc::new(RateLimiter::new(settings.min_send_interval)),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, PlatformError> {
        self.rate_limiter.wait().await;

        // The endpoint embeds the token; log the method only
        tracing::debug!(method = %method, "Calling Telegram Bot API");

        let response = self
            .http_client
            .post(format!("{}/{}", self.endpoint, method))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PlatformError::Timeout
                } else {
                    PlatformError::Network(e.without_url().to_string())
                }
            })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                PlatformError::Timeout
            } else {
                PlatformError::Network(e.without_url().to_string())
            }
        })?;

        let result = decode_response(status, &text);
        if let Err(ref e) = result {
            tracing::warn!(method = %method, error = %e, "Telegram Bot API call failed");
        }
        result
    }
}

#[async_trait]
impl MessagingPlatform for TelegramClient {
    async fn send_threaded_message(
        &self,
        chat_id: &str,
        thread_root: i64,
        text: &str,
    ) -> Result<i64, PlatformError> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": chat_id_value(chat_id),
                    "text": text,
                    "parse_mode": "HTML",
                    "reply_parameters": {
                        "message_id": thread_root,
                        "allow_sending_without_reply": false,
                    },
                }),
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn send_direct_message(
        &self,
        user_chat_id: i64,
        text: &str,
    ) -> Result<i64, PlatformError> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": user_chat_id,
                    "text": text,
                    "parse_mode": "HTML",
                    "link_preview_options": { "is_disabled": true },
                }),
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn publish_image_post(
        &self,
        chat_id: &str,
        image_url: &str,
        caption: &str,
    ) -> Result<i64, PlatformError> {
        let sent: SentMessage = self
            .call(
                "sendPhoto",
                json!({
                    "chat_id": chat_id_value(chat_id),
                    "photo": image_url,
                    "caption": caption,
                    "parse_mode": "HTML",
                }),
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn publish_text_post(&self, chat_id: &str, text: &str) -> Result<i64, PlatformError> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": chat_id_value(chat_id),
                    "text": text,
                    "parse_mode": "HTML",
                }),
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn edit_post_image(
        &self,
        chat_id: &str,
        message_id: i64,
        image_url: &str,
        caption: &str,
    ) -> Result<(), PlatformError> {
        let result: Result<Value, _> = self
            .call(
                "editMessageMedia",
                json!({
                    "chat_id": chat_id_value(chat_id),
                    "message_id": message_id,
                    "media": {
                        "type": "photo",
                        "media": image_url,
                        "caption": caption,
                        "parse_mode": "HTML",
                    },
                }),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_modified() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn edit_post_caption(
        &self,
        chat_id: &str,
        message_id: i64,
        caption: &str,
    ) -> Result<(), PlatformError> {
        let result: Result<Value, _> = self
            .call(
                "editMessageCaption",
                json!({
                    "chat_id": chat_id_value(chat_id),
                    "message_id": message_id,
                    "caption": caption,
                    "parse_mode": "HTML",
                }),
            )
            .await;

        let err = match result {
            Ok(_) => return Ok(()),
            Err(e) if e.is_not_modified() => return Ok(()),
            Err(e) => e,
        };

        // Text-only cards have no caption to edit
        if !matches!(&err, PlatformError::Api { description, .. }
            if description.to_lowercase().contains("no caption"))
        {
            return Err(err);
        }

        let result: Result<Value, _> = self
            .call(
                "editMessageText",
                json!({
                    "chat_id": chat_id_value(chat_id),
                    "message_id": message_id,
                    "text": caption,
                    "parse_mode": "HTML",
                }),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_modified() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn delete_post(&self, chat_id: &str, message_id: i64) -> Result<(), PlatformError> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({
                    "chat_id": chat_id_value(chat_id),
                    "message_id": message_id,
                }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_id_value() {
        assert_eq!(chat_id_value("-1001234567890"), json!(-1001234567890i64));
        assert_eq!(chat_id_value("@refdir_channel"), json!("@refdir_channel"));
    }

    #[test]
    fn test_decode_sent_message() {
        let body = r#"{"ok":true,"result":{"message_id":77,"chat":{"id":-100}}}"#;
        let sent: SentMessage = decode_response(200, body).unwrap();
        assert_eq!(sent.message_id, 77);
    }

    #[test]
    fn test_decode_api_error() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: message to delete not found"}"#;
        let err = decode_response::<bool>(400, body).unwrap_err();
        assert!(matches!(err, PlatformError::Api { code: 400, .. }));
        assert!(err.is_message_gone());
    }

    #[test]
    fn test_decode_non_json_error_body() {
        let err = decode_response::<bool>(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, PlatformError::Api { code: 502, .. }));
    }

    #[test]
    fn test_decode_malformed_success_body() {
        let err = decode_response::<SentMessage>(200, r#"{"ok":true,"result":{}}"#).unwrap_err();
        assert!(matches!(err, PlatformError::Parse(_)));
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_calls() {
        let limiter = RateLimiter::new(Duration::from_millis(30));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
