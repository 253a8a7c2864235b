//! Card lookup by type, state and tag values.

use cardwatch_proto::Card;

use crate::store::CardStore;
use crate::types::TypeResolver;

/// Selection criteria for [`find_cards`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardQuery {
    /// Card type reference (id or name).
    pub type_ref: Option<String>,
    /// Include closed cards.
    pub show_closed: bool,
    /// Tag name/value pairs every returned card must carry.
    pub tag_filters: Vec<(String, String)>,
}

impl CardQuery {
    /// Query matching every open card.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a card type.
    pub fn with_type(mut self, type_ref: impl Into<String>) -> Self {
        self.type_ref = Some(type_ref.into());
        self
    }

    /// Include closed cards.
    pub fn with_closed(mut self) -> Self {
        self.show_closed = true;
        self
    }

    /// Require a tag value.
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tag_filters.push((name.into(), value.into()));
        self
    }
}

/// Find the cards matching `query`.
///
/// A type reference that does not resolve does not narrow the result; every
/// card is considered, as the ledger's own lookups do.
pub fn find_cards<S, R>(store: &S, types: &R, query: &CardQuery) -> Vec<Card>
where
    S: CardStore + ?Sized,
    R: TypeResolver + ?Sized,
{
    let type_id = query
        .type_ref
        .as_deref()
        .and_then(|r| types.resolve_type_id(r));

    let mut cards: Vec<Card> = store
        .cards()
        .into_iter()
        .filter(|card| type_id.as_ref().map_or(true, |t| &card.type_id == t))
        .filter(|card| query.show_closed || !card.is_closed)
        .filter(|card| {
            query
                .tag_filters
                .iter()
                .all(|(name, value)| card.has_tag(name, value))
        })
        .collect();

    cards.sort_by(|a, b| a.id.cmp(&b.id));
    cards
}
