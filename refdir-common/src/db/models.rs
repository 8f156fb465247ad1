//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Commercial tier of a partner profile
///
/// Dispatch order is Star, then Paid, then Free. A new tier must be added
/// to [`Tier::rank`] explicitly; there is no lexicographic fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Star,
    Paid,
    Free,
}

impl Tier {
    /// Position in dispatch order (lower goes first)
    pub fn rank(self) -> u8 {
        match self {
            Tier::Star => 0,
            Tier::Paid => 1,
            Tier::Free => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Star => "star",
            Tier::Paid => "paid",
            Tier::Free => "free",
        }
    }

    /// Map the nullable `partner_type` column; NULL means no paid placement
    pub fn from_column(value: Option<&str>) -> Result<Self, Error> {
        value.map(str::parse).unwrap_or(Ok(Tier::Free))
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "star" => Ok(Tier::Star),
            "paid" => Ok(Tier::Paid),
            "free" => Ok(Tier::Free),
            other => Err(Error::InvalidInput(format!("Unknown partner tier: {}", other))),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partner profile lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerStatus {
    Active,
    Inactive,
    Archived,
}

impl PartnerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PartnerStatus::Active => "active",
            PartnerStatus::Inactive => "inactive",
            PartnerStatus::Archived => "archived",
        }
    }

    /// NULL status rows never went through approval
    pub fn from_column(value: Option<&str>) -> Result<Self, Error> {
        value.map(str::parse).unwrap_or(Ok(PartnerStatus::Inactive))
    }
}

impl FromStr for PartnerStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PartnerStatus::Active),
            "inactive" => Ok(PartnerStatus::Inactive),
            "archived" => Ok(PartnerStatus::Archived),
            other => Err(Error::InvalidInput(format!("Unknown partner status: {}", other))),
        }
    }
}

/// Which kind of request triggered a fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Order,
    Question,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Order => "order",
            RequestKind::Question => "question",
        }
    }
}

impl FromStr for RequestKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(RequestKind::Order),
            "question" => Ok(RequestKind::Question),
            other => Err(Error::InvalidInput(format!("Unknown request kind: {}", other))),
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// Approved service provider listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerProfile {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub status: PartnerStatus,
    pub tier: Tier,
    /// Thread root of the partner's card in the discussion chat
    pub discussion_message_id: Option<i64>,
    /// Message id of the partner's card in the broadcast channel
    pub channel_post_id: Option<i64>,
    pub category_ids: Vec<String>,
    pub profession: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub tg_channel: Option<String>,
    pub website: Option<String>,
    /// Video channel links, rendered as one line on the card
    pub youtube: Option<String>,
    pub rutube: Option<String>,
    pub dzen: Option<String>,
    pub vk_video: Option<String>,
    /// `@handle` or full t.me link
    pub tg_video: Option<String>,
    pub self_description: Option<String>,
    pub agency_name: Option<String>,
    pub agency_description: Option<String>,
    pub office_address: Option<String>,
    /// Card image shown on the channel post
    pub photo_url: Option<String>,
}

impl PartnerProfile {
    pub fn is_active(&self) -> bool {
        self.status == PartnerStatus::Active
    }
}

/// An order or a question submitted by an end user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub kind: RequestKind,
    pub id: String,
    pub user_id: String,
    /// Primary category, always present
    pub category_id: String,
    /// Extra category links beyond the primary one
    #[serde(default)]
    pub extra_category_ids: Vec<String>,
    pub title: Option<String>,
    pub text: String,
    pub city: Option<String>,
    pub budget: Option<String>,
    pub contact: Option<String>,
    pub details: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Request {
    /// Union of the primary and extra category ids, primary first, no duplicates
    pub fn category_ids(&self) -> Vec<String> {
        let mut ids = vec![self.category_id.clone()];
        for id in &self.extra_category_ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

/// Delivery ledger entry: one per (request, partner) confirmed delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub request_kind: RequestKind,
    pub request_id: String,
    pub partner_id: String,
    pub message_id: i64,
    pub delivered_at: DateTime<Utc>,
}

/// Kinds of notification error records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Category or partner query failed; the pass was aborted
    LookupFailed,
    /// Partner has no thread root in the discussion chat; partner skipped
    MissingDiscussionAnchor,
    /// Partner has no channel card; delivery still attempted
    MissingChannelPost,
    /// Transport or API error while sending; partner skipped for this pass
    PlatformSendFailed,
    /// Delivery confirmed but the ledger row could not be written
    LedgerWriteFailed,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::LookupFailed => "lookup_failed",
            ErrorKind::MissingDiscussionAnchor => "missing_discussion_anchor",
            ErrorKind::MissingChannelPost => "missing_channel_post",
            ErrorKind::PlatformSendFailed => "platform_send_failed",
            ErrorKind::LedgerWriteFailed => "ledger_write_failed",
        }
    }
}

impl FromStr for ErrorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lookup_failed" => Ok(ErrorKind::LookupFailed),
            "missing_discussion_anchor" => Ok(ErrorKind::MissingDiscussionAnchor),
            "missing_channel_post" => Ok(ErrorKind::MissingChannelPost),
            "platform_send_failed" => Ok(ErrorKind::PlatformSendFailed),
            "ledger_write_failed" => Ok(ErrorKind::LedgerWriteFailed),
            other => Err(Error::InvalidInput(format!("Unknown error kind: {}", other))),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only operational error log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationErrorRecord {
    pub id: String,
    pub kind: ErrorKind,
    /// Absent when the error is not partner-specific
    pub partner_id: Option<String>,
    pub entity_type: RequestKind,
    pub entity_id: String,
    pub message: Option<String>,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to append a [`NotificationErrorRecord`]
#[derive(Debug, Clone)]
pub struct NewNotificationError {
    pub kind: ErrorKind,
    pub partner_id: Option<String>,
    pub entity_type: RequestKind,
    pub entity_id: String,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_rank_order() {
        assert!(Tier::Star.rank() < Tier::Paid.rank());
        assert!(Tier::Paid.rank() < Tier::Free.rank());
    }

    #[test]
    fn test_tier_null_column_is_free() {
        assert_eq!(Tier::from_column(None).unwrap(), Tier::Free);
        assert_eq!(Tier::from_column(Some("star")).unwrap(), Tier::Star);
        assert!(Tier::from_column(Some("gold")).is_err());
    }

    #[test]
    fn test_request_category_union_dedups() {
        let request = Request {
            kind: RequestKind::Order,
            id: "o1".to_string(),
            user_id: "u1".to_string(),
            category_id: "a".to_string(),
            extra_category_ids: vec!["b".to_string(), "a".to_string(), "b".to_string()],
            title: None,
            text: "text".to_string(),
            city: None,
            budget: None,
            contact: None,
            details: None,
            status: None,
            created_at: None,
        };

        assert_eq!(request.category_ids(), vec!["a".to_string(), "b".to_string()]);
    }
}
