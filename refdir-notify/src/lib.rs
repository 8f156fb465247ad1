//! refdir-notify library interface
//!
//! Partner matching and notification fan-out for the referral directory,
//! plus the partner card lifecycle on the broadcast channel.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod platform;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use config::NotifyConfig;
use platform::MessagingPlatform;
use refdir_common::events::EventBus;
use services::{ChannelPublisher, FanOutEngine};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub platform: Arc<dyn MessagingPlatform>,
    pub engine: Arc<FanOutEngine>,
    pub publisher: Arc<ChannelPublisher>,
    pub config: Arc<NotifyConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        platform: Arc<dyn MessagingPlatform>,
        config: NotifyConfig,
    ) -> Self {
        let engine = FanOutEngine::new(
            db.clone(),
            Arc::clone(&platform),
            &config,
            event_bus.clone(),
        );
        let publisher = ChannelPublisher::new(
            db.clone(),
            Arc::clone(&platform),
            config.channel.clone(),
            event_bus.clone(),
        );

        Self {
            db,
            event_bus,
            platform,
            engine: Arc::new(engine),
            publisher: Arc::new(publisher),
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::request_routes())
        .merge(api::partner_routes())
        .merge(api::notification_error_routes())
        .merge(api::webhook_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
