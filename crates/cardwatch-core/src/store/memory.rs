//! In-memory card store.

use dashmap::DashMap;

use cardwatch_proto::{action_types, Action, Card, Commit};

use super::CardStore;
use crate::error::Error;

/// Card store backed by a concurrent hash map.
///
/// Understands `CREATE_CARD`, `SET_CARD_TAG`, `CLOSE_CARD` and
/// `EXECUTE_COMMAND`; other action types pass through without effect.
/// Each commit is applied to a private copy of the card and written back only
/// once every action succeeded.
#[derive(Default)]
pub struct MemoryCardStore {
    cards: DashMap<String, Card>,
}

impl MemoryCardStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with cards.
    pub fn with_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let store = Self::new();
        for card in cards {
            store.insert(card);
        }
        store
    }

    /// Insert or replace a card directly.
    pub fn insert(&self, card: Card) {
        self.cards.insert(card.id.clone(), card);
    }

    /// Remove a card directly.
    pub fn remove(&self, card_id: &str) -> Option<Card> {
        self.cards.remove(card_id).map(|(_, card)| card)
    }

    /// Number of cards held.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Check whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    fn apply_action(commit: &Commit, card: &mut Option<Card>, action: &Action) -> Result<(), Error> {
        let failure = |reason: String| Error::ApplyFailure {
            card_id: commit.card_id.clone(),
            reason,
        };

        match action.action_type.as_str() {
            action_types::CREATE_CARD => {
                if card.is_none() {
                    let type_id = action
                        .data_str("typeId")
                        .ok_or_else(|| failure(format!("action {} has no typeId", action.id)))?;
                    *card = Some(Card::new(commit.card_id.clone(), type_id));
                }
            }
            action_types::SET_CARD_TAG => {
                let card = card
                    .as_mut()
                    .ok_or_else(|| failure("card does not exist".to_string()))?;
                let name = action
                    .data_str("name")
                    .ok_or_else(|| failure(format!("action {} has no tag name", action.id)))?;
                let value = action.data_str("value").unwrap_or_default();
                card.tags.insert(name.to_string(), value.to_string());
                if let Some(amount) = action.data.get("amount").and_then(|v| v.as_f64()) {
                    card.balance += amount;
                }
            }
            action_types::CLOSE_CARD => {
                card.as_mut()
                    .ok_or_else(|| failure("card does not exist".to_string()))?
                    .is_closed = true;
            }
            action_types::EXECUTE_COMMAND => {}
            other => {
                tracing::trace!(action_id = %action.id, action_type = other, "ignoring action");
            }
        }

        Ok(())
    }
}

impl CardStore for MemoryCardStore {
    fn exists(&self, card_id: &str) -> bool {
        self.cards.contains_key(card_id)
    }

    fn get(&self, card_id: &str) -> Option<Card> {
        self.cards.get(card_id).map(|entry| entry.value().clone())
    }

    fn apply_commit(&self, commit: &Commit) -> Result<(), Error> {
        let mut card = self.get(&commit.card_id);

        for action in &commit.actions {
            Self::apply_action(commit, &mut card, action)?;
        }

        match card {
            Some(card) => {
                self.insert(card);
                Ok(())
            }
            None => Err(Error::ApplyFailure {
                card_id: commit.card_id.clone(),
                reason: "card does not exist".to_string(),
            }),
        }
    }

    fn cards(&self) -> Vec<Card> {
        self.cards.iter().map(|entry| entry.value().clone()).collect()
    }
}
