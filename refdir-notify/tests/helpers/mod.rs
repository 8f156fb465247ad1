//! Test Helper Utilities
//!
//! Shared utilities for testing refdir-notify: a temp-file database with the
//! full schema, seed helpers, and a scripted messaging platform.

#![allow(dead_code)]

use async_trait::async_trait;
use refdir_common::db::{NotificationErrorRecord, Request, RequestKind};
use refdir_common::events::EventBus;
use refdir_notify::config::{ChannelConfig, NotifyConfig};
use refdir_notify::db::{notification_errors, requests};
use refdir_notify::platform::{MessagingPlatform, PlatformError};
use refdir_notify::services::{ChannelPublisher, FanOutEngine};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const DISCUSSION_CHAT_ID: &str = "-1002000000000";
pub const CHANNEL_ID: &str = "-1001234567890";

/// Create temporary test database with the full schema
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let pool = refdir_common::db::init_database(&temp_dir.path().join("refdir.db"))
        .await
        .expect("Failed to initialize test database");
    (temp_dir, pool)
}

pub fn test_config() -> NotifyConfig {
    NotifyConfig {
        discussion_chat_id: DISCUSSION_CHAT_ID.to_string(),
        channel: ChannelConfig {
            chat_id: CHANNEL_ID.to_string(),
            username: None,
        },
        max_lock_wait_ms: 1000,
    }
}

pub fn create_engine(pool: &SqlitePool, platform: &Arc<FakePlatform>) -> FanOutEngine {
    FanOutEngine::new(
        pool.clone(),
        platform.clone(),
        &test_config(),
        EventBus::new(100),
    )
}

pub fn create_publisher(pool: &SqlitePool, platform: &Arc<FakePlatform>) -> ChannelPublisher {
    ChannelPublisher::new(
        pool.clone(),
        platform.clone(),
        test_config().channel,
        EventBus::new(100),
    )
}

// ============================================================================
// Seeding
// ============================================================================

pub async fn seed_category(pool: &SqlitePool, id: &str, name: &str) {
    sqlx::query("INSERT INTO categories (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .expect("seed category");
}

/// Partner row for seeding; defaults to an active free partner with an
/// anchor and a channel post
#[derive(Debug, Clone)]
pub struct PartnerSeed {
    pub id: String,
    pub name: String,
    pub tier: Option<&'static str>,
    pub status: Option<&'static str>,
    pub discussion_message_id: Option<i64>,
    pub channel_post_id: Option<i64>,
    pub photo_url: Option<String>,
    pub categories: Vec<String>,
}

impl PartnerSeed {
    pub fn new(id: &str, categories: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: format!("Partner {}", id.to_uppercase()),
            tier: Some("free"),
            status: Some("active"),
            discussion_message_id: Some(100),
            channel_post_id: Some(10),
            photo_url: None,
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn tier(mut self, tier: &'static str) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn no_tier(mut self) -> Self {
        self.tier = None;
        self
    }

    pub fn status(mut self, status: &'static str) -> Self {
        self.status = Some(status);
        self
    }

    pub fn anchor(mut self, anchor: Option<i64>) -> Self {
        self.discussion_message_id = anchor;
        self
    }

    pub fn post(mut self, post: Option<i64>) -> Self {
        self.channel_post_id = post;
        self
    }

    pub fn photo(mut self, url: &str) -> Self {
        self.photo_url = Some(url.to_string());
        self
    }
}

pub async fn seed_partner(pool: &SqlitePool, seed: PartnerSeed) {
    sqlx::query(
        r#"
        INSERT INTO partner_profiles
            (id, user_id, name, status, partner_type, discussion_message_id, channel_post_id,
             profession, city, photo_url)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'Architect', 'Yerevan', ?)
        "#,
    )
    .bind(&seed.id)
    .bind(format!("user-{}", seed.id))
    .bind(&seed.name)
    .bind(seed.status)
    .bind(seed.tier)
    .bind(seed.discussion_message_id)
    .bind(seed.channel_post_id)
    .bind(&seed.photo_url)
    .execute(pool)
    .await
    .expect("seed partner");

    for category_id in &seed.categories {
        sqlx::query("INSERT INTO partner_profile_categories (profile_id, category_id) VALUES (?, ?)")
            .bind(&seed.id)
            .bind(category_id)
            .execute(pool)
            .await
            .expect("seed partner category");
    }
}

/// Insert an order with a primary category and extra category links
pub async fn seed_order(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
    category_id: &str,
    extra_categories: &[&str],
) -> Request {
    sqlx::query(
        r#"
        INSERT INTO orders (id, user_id, category_id, title, text, city, budget, contact)
        VALUES (?, ?, ?, 'Kitchen renovation', 'Need a full redesign', 'Yerevan', '5000', NULL)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(category_id)
    .execute(pool)
    .await
    .expect("seed order");

    for extra in extra_categories {
        sqlx::query("INSERT INTO order_categories (order_id, category_id) VALUES (?, ?)")
            .bind(id)
            .bind(extra)
            .execute(pool)
            .await
            .expect("seed order category");
    }

    requests::load_request(pool, RequestKind::Order, id)
        .await
        .expect("load order")
        .expect("order exists")
}

pub async fn seed_question(pool: &SqlitePool, id: &str, user_id: &str, category_id: &str) -> Request {
    sqlx::query(
        r#"
        INSERT INTO questions (id, user_id, category_id, text, details)
        VALUES (?, ?, ?, 'Which permits do I need?', 'Two-storey house')
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(category_id)
    .execute(pool)
    .await
    .expect("seed question");

    requests::load_request(pool, RequestKind::Question, id)
        .await
        .expect("load question")
        .expect("question exists")
}

/// Register a requester's platform chat id
pub async fn seed_requester(pool: &SqlitePool, user_id: &str, telegram_id: i64) {
    sqlx::query("INSERT INTO profiles (id, telegram_id, first_name) VALUES (?, ?, 'Requester')")
        .bind(user_id)
        .bind(telegram_id)
        .execute(pool)
        .await
        .expect("seed requester");
}

// ============================================================================
// Queries
// ============================================================================

pub async fn publication_count(pool: &SqlitePool, kind: RequestKind, request_id: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM publications WHERE request_kind = ? AND request_id = ?",
    )
    .bind(kind.as_str())
    .bind(request_id)
    .fetch_one(pool)
    .await
    .expect("count publications")
}

pub async fn errors_for(pool: &SqlitePool, request: &Request) -> Vec<NotificationErrorRecord> {
    notification_errors::errors_for_entity(pool, request.kind, &request.id)
        .await
        .expect("list errors")
}

pub async fn channel_state(pool: &SqlitePool, partner_id: &str) -> (Option<i64>, Option<i64>, i64) {
    sqlx::query_as(
        "SELECT channel_post_id, discussion_message_id, publishing FROM partner_profiles WHERE id = ?",
    )
    .bind(partner_id)
    .fetch_one(pool)
    .await
    .expect("partner channel state")
}

// ============================================================================
// Scripted messaging platform
// ============================================================================

/// One recorded platform call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Threaded {
        chat_id: String,
        thread_root: i64,
        text: String,
    },
    Direct {
        user_chat_id: i64,
        text: String,
    },
    ImagePost {
        chat_id: String,
        image_url: String,
        caption: String,
    },
    TextPost {
        chat_id: String,
        text: String,
    },
    EditImage {
        message_id: i64,
        image_url: String,
    },
    EditCaption {
        message_id: i64,
        caption: String,
    },
    Delete {
        message_id: i64,
    },
}

/// In-memory platform that records calls and fails on demand
pub struct FakePlatform {
    calls: Mutex<Vec<Call>>,
    next_message_id: AtomicI64,
    failing_threads: Mutex<HashSet<i64>>,
    fail_direct: AtomicBool,
    fail_image_post: AtomicBool,
    fail_text_post: AtomicBool,
    fail_image_edit: AtomicBool,
    delete_error: Mutex<Option<PlatformError>>,
    send_delay: Mutex<Option<Duration>>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(5000),
            failing_threads: Mutex::new(HashSet::new()),
            fail_direct: AtomicBool::new(false),
            fail_image_post: AtomicBool::new(false),
            fail_text_post: AtomicBool::new(false),
            fail_image_edit: AtomicBool::new(false),
            delete_error: Mutex::new(None),
            send_delay: Mutex::new(None),
        })
    }

    pub fn fail_thread(&self, thread_root: i64) {
        self.failing_threads.lock().unwrap().insert(thread_root);
    }

    pub fn fail_direct_messages(&self) {
        self.fail_direct.store(true, Ordering::SeqCst);
    }

    pub fn fail_image_posts(&self) {
        self.fail_image_post.store(true, Ordering::SeqCst);
    }

    pub fn fail_text_posts(&self) {
        self.fail_text_post.store(true, Ordering::SeqCst);
    }

    pub fn fail_image_edits(&self) {
        self.fail_image_edit.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes_with(&self, error: PlatformError) {
        *self.delete_error.lock().unwrap() = Some(error);
    }

    /// Delay every threaded send, to overlap concurrent passes
    pub fn delay_sends(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Thread roots of threaded sends, in call order
    pub fn threaded_roots(&self) -> Vec<i64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Threaded { thread_root, .. } => Some(thread_root),
                _ => None,
            })
            .collect()
    }

    pub fn direct_messages(&self) -> Vec<(i64, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Direct { user_chat_id, text } => Some((user_chat_id, text)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_id(&self) -> i64 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }

    fn rejected(description: &str) -> PlatformError {
        PlatformError::Api {
            code: 400,
            description: format!("Bad Request: {}", description),
        }
    }
}

#[async_trait]
impl MessagingPlatform for FakePlatform {
    async fn send_threaded_message(
        &self,
        chat_id: &str,
        thread_root: i64,
        text: &str,
    ) -> Result<i64, PlatformError> {
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.record(Call::Threaded {
            chat_id: chat_id.to_string(),
            thread_root,
            text: text.to_string(),
        });

        if self.failing_threads.lock().unwrap().contains(&thread_root) {
            return Err(Self::rejected("message to be replied not found"));
        }
        Ok(self.next_id())
    }

    async fn send_direct_message(
        &self,
        user_chat_id: i64,
        text: &str,
    ) -> Result<i64, PlatformError> {
        self.record(Call::Direct {
            user_chat_id,
            text: text.to_string(),
        });
        if self.fail_direct.load(Ordering::SeqCst) {
            return Err(PlatformError::Timeout);
        }
        Ok(self.next_id())
    }

    async fn publish_image_post(
        &self,
        chat_id: &str,
        image_url: &str,
        caption: &str,
    ) -> Result<i64, PlatformError> {
        self.record(Call::ImagePost {
            chat_id: chat_id.to_string(),
            image_url: image_url.to_string(),
            caption: caption.to_string(),
        });
        if self.fail_image_post.load(Ordering::SeqCst) {
            return Err(Self::rejected("wrong file identifier/HTTP URL specified"));
        }
        Ok(self.next_id())
    }

    async fn publish_text_post(&self, chat_id: &str, text: &str) -> Result<i64, PlatformError> {
        self.record(Call::TextPost {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
        });
        if self.fail_text_post.load(Ordering::SeqCst) {
            return Err(PlatformError::Network("connection reset".to_string()));
        }
        Ok(self.next_id())
    }

    async fn edit_post_image(
        &self,
        _chat_id: &str,
        message_id: i64,
        image_url: &str,
        _caption: &str,
    ) -> Result<(), PlatformError> {
        self.record(Call::EditImage {
            message_id,
            image_url: image_url.to_string(),
        });
        if self.fail_image_edit.load(Ordering::SeqCst) {
            return Err(Self::rejected("MEDIA_EMPTY"));
        }
        Ok(())
    }

    async fn edit_post_caption(
        &self,
        _chat_id: &str,
        message_id: i64,
        caption: &str,
    ) -> Result<(), PlatformError> {
        self.record(Call::EditCaption {
            message_id,
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn delete_post(&self, _chat_id: &str, message_id: i64) -> Result<(), PlatformError> {
        self.record(Call::Delete { message_id });
        match self.delete_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
