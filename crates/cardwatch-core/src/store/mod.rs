//! Card store abstraction.
//!
//! The store owns the current card aggregates and implements commit
//! semantics. The change-detection core only reads snapshots out of it and
//! asks it to apply commits.

mod memory;

pub use memory::MemoryCardStore;

use cardwatch_proto::{Card, Commit};

use crate::error::Error;

/// Holder of current card state.
pub trait CardStore: Send + Sync {
    /// Check whether a card exists.
    fn exists(&self, card_id: &str) -> bool;

    /// Get a snapshot of a card.
    fn get(&self, card_id: &str) -> Option<Card>;

    /// Apply one commit.
    ///
    /// A failed commit must leave the targeted card untouched.
    fn apply_commit(&self, commit: &Commit) -> Result<(), Error>;

    /// Snapshot every card in the store.
    fn cards(&self) -> Vec<Card>;
}
