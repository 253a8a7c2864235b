//! Card-type configuration and type reference resolution.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

use cardwatch_proto::{CardType, TypeId};

use crate::error::Error;

/// Resolves a card type reference (an id or a name) to a type id.
pub trait TypeResolver: Send + Sync {
    /// Resolve `reference`, returning `None` when no type matches.
    fn resolve_type_id(&self, reference: &str) -> Option<TypeId>;
}

/// In-memory card-type configuration.
///
/// The ledger republishes its configuration from time to time; the registry
/// can be replaced wholesale with [`TypeRegistry::update`] while subscribers
/// keep resolving against it.
#[derive(Default)]
pub struct TypeRegistry {
    types: RwLock<HashMap<TypeId, CardType>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from a list of card types.
    pub fn with_types(types: impl IntoIterator<Item = CardType>) -> Self {
        let registry = Self::new();
        registry.update(types);
        registry
    }

    /// Parse a JSON array of `{id, name}` objects.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let types: Vec<CardType> = serde_json::from_str(json)?;
        Ok(Self::with_types(types))
    }

    /// Load a JSON card-type file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Replace the configured types.
    pub fn update(&self, types: impl IntoIterator<Item = CardType>) {
        let types: HashMap<TypeId, CardType> =
            types.into_iter().map(|t| (t.id.clone(), t)).collect();
        let count = types.len();
        *self.types.write() = types;
        tracing::debug!(count, "card type configuration updated");
    }

    /// Register or replace a single type.
    pub fn register(&self, card_type: CardType) {
        self.types.write().insert(card_type.id.clone(), card_type);
    }

    /// Number of configured types.
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Check whether no types are configured.
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

impl TypeResolver for TypeRegistry {
    fn resolve_type_id(&self, reference: &str) -> Option<TypeId> {
        let types = self.types.read();
        if types.contains_key(&TypeId::new(reference)) {
            return Some(TypeId::new(reference));
        }
        types
            .values()
            .find(|t| t.name == reference)
            .map(|t| t.id.clone())
    }
}
