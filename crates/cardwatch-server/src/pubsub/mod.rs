//! Pub-sub infrastructure for card notifications.
//!
//! The [`EventBus`] keeps the live subscriptions of every topic and fans
//! published events out to the ones whose [`SubscriptionFilter`] accepts them.

pub mod filter;
mod manager;
mod subscription;

pub use filter::{card_updated_matches, command_executed_matches, SubscriptionFilter};
pub use manager::{EventBus, PublishOutcome};
pub use subscription::{SubscriptionHandle, SubscriptionInfo};
