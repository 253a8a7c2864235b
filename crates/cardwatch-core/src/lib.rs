//! cardwatch core - change detection over card commit batches.
//!
//! This crate turns ledger commit batches into card-updated and
//! command-executed events. It holds no subscriber state; publishing and
//! filtering live in `cardwatch-server`.

pub mod differ;
pub mod error;
pub mod metrics;
pub mod query;
pub mod store;
pub mod types;
pub mod wildcard;

pub use differ::{extract_commands, BatchDiff, BatchSnapshots, CommitDiffer};
pub use error::Error;
pub use metrics::{new_shared_metrics, FailureKind, FeedMetrics, MetricsSnapshot, SharedFeedMetrics};
pub use query::{find_cards, CardQuery};
pub use store::{CardStore, MemoryCardStore};
pub use types::{TypeRegistry, TypeResolver};

/// Re-export protocol types.
pub use cardwatch_proto as proto;
