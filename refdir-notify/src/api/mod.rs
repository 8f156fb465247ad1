//! HTTP API handlers for refdir-notify
//!
//! Internal service boundary: the mini-app backend reports new requests and
//! moderation actions here, Telegram delivers webhook updates, and operators
//! read the error log and the live event stream.

pub mod health;
pub mod notification_errors;
pub mod partners;
pub mod requests;
pub mod sse;
pub mod webhook;

pub use health::health_routes;
pub use notification_errors::notification_error_routes;
pub use partners::partner_routes;
pub use requests::request_routes;
pub use sse::event_stream;
pub use webhook::webhook_routes;
