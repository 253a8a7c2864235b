//! Notification events derived from commit batches.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::error::Error;

/// A named event channel subscribers attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Topic {
    /// Card snapshots changed by a commit.
    CardUpdated,
    /// Commands executed against cards.
    CommandExecuted,
}

impl Topic {
    /// Wire name of the topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::CardUpdated => "cardUpdated",
            Topic::CommandExecuted => "commandExecuted",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cardUpdated" => Ok(Topic::CardUpdated),
            "commandExecuted" => Ok(Topic::CommandExecuted),
            other => Err(Error::InvalidPayload(format!("unknown topic: {}", other))),
        }
    }
}

/// A key/value command parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

impl Parameter {
    /// Create a parameter.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A card as it stands after a commit, paired with its pre-batch snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardUpdateEvent {
    /// Post-commit card.
    pub card: Card,
    /// Snapshot taken before the batch, `None` for cards the batch created.
    pub old_card: Option<Card>,
}

impl CardUpdateEvent {
    /// Pair a card with its previous snapshot.
    pub fn new(card: Card, old_card: Option<Card>) -> Self {
        debug_assert!(old_card.as_ref().map_or(true, |old| old.id == card.id));
        Self { card, old_card }
    }

    /// Check whether the card did not exist before the batch.
    pub fn is_new_card(&self) -> bool {
        self.old_card.is_none()
    }
}

/// One `EXECUTE_COMMAND` action, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandExecutedEvent {
    /// Action identifier.
    pub id: String,
    /// Command name.
    pub name: String,
    /// Card the action refers to.
    pub card_id: String,
    /// Command parameters. Order carries no meaning.
    pub parameters: Vec<Parameter>,
}

impl CommandExecutedEvent {
    /// Value of the named parameter, if present.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

/// A published notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Event {
    CardUpdated(CardUpdateEvent),
    CommandExecuted(CommandExecutedEvent),
}

impl Event {
    /// Topic this event is published on.
    pub fn topic(&self) -> Topic {
        match self {
            Event::CardUpdated(_) => Topic::CardUpdated,
            Event::CommandExecuted(_) => Topic::CommandExecuted,
        }
    }

    /// Card the event concerns.
    pub fn card_id(&self) -> &str {
        match self {
            Event::CardUpdated(e) => &e.card.id,
            Event::CommandExecuted(e) => &e.card_id,
        }
    }
}

impl From<CardUpdateEvent> for Event {
    fn from(event: CardUpdateEvent) -> Self {
        Event::CardUpdated(event)
    }
}

impl From<CommandExecutedEvent> for Event {
    fn from(event: CommandExecutedEvent) -> Self {
        Event::CommandExecuted(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names() {
        assert_eq!(Topic::CardUpdated.to_string(), "cardUpdated");
        assert_eq!("commandExecuted".parse::<Topic>().unwrap(), Topic::CommandExecuted);
        assert!("cardDeleted".parse::<Topic>().is_err());
    }

    #[test]
    fn test_event_topic() {
        let update = Event::from(CardUpdateEvent::new(Card::new("c1", "T"), None));
        assert_eq!(update.topic(), Topic::CardUpdated);
        assert_eq!(update.card_id(), "c1");

        let command = Event::from(CommandExecutedEvent {
            id: "a1".into(),
            name: "VOID".into(),
            card_id: "c2".into(),
            parameters: vec![Parameter::new("reason", "dup")],
        });
        assert_eq!(command.topic(), Topic::CommandExecuted);
        assert_eq!(command.card_id(), "c2");
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event::from(CommandExecutedEvent {
            id: "a1".into(),
            name: "VOID".into(),
            card_id: "c1".into(),
            parameters: vec![],
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["commandExecuted"]["cardId"], "c1");
        assert_eq!(json["commandExecuted"]["name"], "VOID");
    }

    #[test]
    fn test_parameter_lookup() {
        let event = CommandExecutedEvent {
            id: "a1".into(),
            name: "VOID".into(),
            card_id: "c1".into(),
            parameters: vec![Parameter::new("reason", "dup")],
        };

        assert_eq!(event.parameter("reason"), Some("dup"));
        assert_eq!(event.parameter("by"), None);
    }
}
