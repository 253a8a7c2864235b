//! Card aggregates and card-type configuration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a configured card type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(String);

impl TypeId {
    /// Create a type identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A card type as published in the ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardType {
    /// Stable type identifier.
    pub id: TypeId,
    /// Human readable name, also accepted as a type reference.
    pub name: String,
}

impl CardType {
    /// Create a new card type.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: TypeId::new(id),
            name: name.into(),
        }
    }
}

/// Snapshot of a card aggregate.
///
/// Snapshots are plain values: cloning one out of a store freezes its state
/// for before/after comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Card identifier.
    pub id: String,
    /// Configured type of the card.
    pub type_id: TypeId,
    /// Current balance.
    #[serde(default)]
    pub balance: f64,
    /// Tag values keyed by tag name.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Whether the card has been closed.
    #[serde(default)]
    pub is_closed: bool,
}

impl Card {
    /// Create an open card with no tags and a zero balance.
    pub fn new(id: impl Into<String>, type_id: impl Into<TypeId>) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            balance: 0.0,
            tags: BTreeMap::new(),
            is_closed: false,
        }
    }

    /// Set a tag value.
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    /// Set the balance.
    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }

    /// Mark the card as closed.
    pub fn closed(mut self) -> Self {
        self.is_closed = true;
        self
    }

    /// Value of the named tag, or `default` when the card has no such tag.
    pub fn tag<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.tags.get(name).map(String::as_str).unwrap_or(default)
    }

    /// Check whether the card carries the tag with exactly this value.
    pub fn has_tag(&self, name: &str, value: &str) -> bool {
        self.tags.get(name).is_some_and(|v| v == value)
    }
}
