//! Notification services
//!
//! The fan-out pass is built leaves-first: category matcher, tier ranker,
//! delivery ledger, per-partner dispatcher, requester summarizer. The channel
//! publisher drives partner cards on the broadcast channel.

pub mod category_matcher;
pub mod channel_publisher;
pub mod delivery_ledger;
pub mod dispatcher;
pub mod error_log;
pub mod fan_out;
pub mod message_format;
pub mod summarizer;
pub mod tier_ranker;

pub use category_matcher::{match_partners, CategoryMatch};
pub use channel_publisher::{ChannelPublisher, PublicationOutcome, PublishError};
pub use delivery_ledger::{DeliveryLedger, LedgerWrite};
pub use dispatcher::{Dispatcher, NotifiedPartner, PartnerOutcome};
pub use error_log::ErrorLog;
pub use fan_out::{FanOutEngine, FanOutReport};
pub use summarizer::{deep_link, Summarizer};
pub use tier_ranker::rank_partners;
