//! cardwatch server library.
//!
//! This crate provides the in-process notification surface: the event bus
//! with its subscription filters, the commit feed processor that drives it,
//! and batch replay for the standalone binary.

pub mod config;
pub mod error;
pub mod feed;
pub mod pubsub;
pub mod replay;

pub use config::{Args, ServerConfig};
pub use error::Error;
pub use feed::{start_processor, BatchReport, ChangeFeed, FeedHandle, FeedProcessor};
pub use pubsub::{EventBus, PublishOutcome, SubscriptionFilter, SubscriptionHandle, SubscriptionInfo};
