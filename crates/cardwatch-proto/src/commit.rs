//! Commits and actions as delivered by the ledger feed.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::event::Parameter;

/// Action types understood by this crate.
pub mod action_types {
    /// Creates the card a commit targets.
    pub const CREATE_CARD: &str = "CREATE_CARD";
    /// Sets a tag value, optionally moving the balance.
    pub const SET_CARD_TAG: &str = "SET_CARD_TAG";
    /// Closes the card.
    pub const CLOSE_CARD: &str = "CLOSE_CARD";
    /// Records a command invocation against a card.
    pub const EXECUTE_COMMAND: &str = "EXECUTE_COMMAND";
}

/// One atomic set of actions applied to a single card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// The card this commit transitions.
    pub card_id: String,
    /// Actions in application order.
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Commit {
    /// Create an empty commit for a card.
    pub fn new(card_id: impl Into<String>) -> Self {
        Self {
            card_id: card_id.into(),
            actions: Vec::new(),
        }
    }

    /// Append an action.
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Iterate over the `EXECUTE_COMMAND` actions of this commit.
    pub fn command_actions(&self) -> impl Iterator<Item = &Action> + '_ {
        self.actions.iter().filter(|a| a.is_command())
    }
}

/// One state-changing operation within a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Action identifier.
    pub id: String,
    /// Card the action refers to.
    pub card_id: String,
    /// Action type, e.g. `EXECUTE_COMMAND`.
    pub action_type: String,
    /// Free-form action payload.
    #[serde(default)]
    pub data: JsonValue,
}

/// A decoded `EXECUTE_COMMAND` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandInvocation {
    /// Command name.
    pub name: String,
    /// Flattened command parameters.
    pub parameters: Vec<Parameter>,
}

impl Action {
    /// Create an action.
    pub fn new(
        id: impl Into<String>,
        card_id: impl Into<String>,
        action_type: impl Into<String>,
        data: JsonValue,
    ) -> Self {
        Self {
            id: id.into(),
            card_id: card_id.into(),
            action_type: action_type.into(),
            data,
        }
    }

    /// Create an `EXECUTE_COMMAND` action.
    pub fn execute_command(
        id: impl Into<String>,
        card_id: impl Into<String>,
        name: &str,
        params: JsonValue,
    ) -> Self {
        Self::new(
            id,
            card_id,
            action_types::EXECUTE_COMMAND,
            serde_json::json!({ "name": name, "params": params }),
        )
    }

    /// Check whether this action records a command invocation.
    pub fn is_command(&self) -> bool {
        self.action_type == action_types::EXECUTE_COMMAND
    }

    /// Read a string field from the payload.
    pub fn data_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(JsonValue::as_str)
    }

    /// Decode the command name and parameters of an `EXECUTE_COMMAND` action.
    ///
    /// A missing or null `params` yields no parameters. Non-string parameter
    /// values are rendered as JSON text.
    pub fn command(&self) -> Result<CommandInvocation, Error> {
        if !self.is_command() {
            return Err(Error::InvalidPayload(format!(
                "action {} is {}, not {}",
                self.id,
                self.action_type,
                action_types::EXECUTE_COMMAND
            )));
        }

        let name = self.data_str("name").ok_or_else(|| {
            Error::InvalidPayload(format!("command action {} has no name", self.id))
        })?;

        let parameters = match self.data.get("params") {
            None | Some(JsonValue::Null) => Vec::new(),
            Some(JsonValue::Object(params)) => params
                .iter()
                .map(|(key, value)| Parameter::new(key.as_str(), render_param(value)))
                .collect(),
            Some(other) => {
                return Err(Error::InvalidPayload(format!(
                    "command action {} has non-object params: {}",
                    self.id, other
                )));
            }
        };

        Ok(CommandInvocation {
            name: name.to_string(),
            parameters,
        })
    }
}

fn render_param(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decode one feed batch: a JSON array of commits.
pub fn decode_batch(json: &str) -> Result<Vec<Commit>, Error> {
    Ok(serde_json::from_str(json)?)
}
