//! # refdir Common Library
//!
//! Shared code for the partner referral directory services including:
//! - Database schema and models (categories, partners, requests, ledger, error log)
//! - Event types (DirectoryEvent enum) and the in-process EventBus
//! - Bootstrap configuration loading
//! - SSE helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
