//! Subscriber-supplied filter variables.

use serde::{Deserialize, Serialize};

/// Variables narrowing a `cardUpdated` subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardUpdatedVariables {
    /// Card type reference (id or name).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<String>,
    /// Tag names whose change should be reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Report only balance changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_balance: Option<bool>,
}

impl CardUpdatedVariables {
    /// Variables accepting every card update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one card type.
    pub fn with_type(mut self, type_ref: impl Into<String>) -> Self {
        self.type_ref = Some(type_ref.into());
        self
    }

    /// Restrict to changes of the given tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to balance changes.
    pub fn with_check_balance(mut self, check: bool) -> Self {
        self.check_balance = Some(check);
        self
    }
}

/// Variables narrowing a `commandExecuted` subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandExecutedVariables {
    /// Command name pattern; `*` is a wildcard at either end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CommandExecutedVariables {
    /// Variables accepting every command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to command names matching `pattern`.
    pub fn with_name(mut self, pattern: impl Into<String>) -> Self {
        self.name = Some(pattern.into());
        self
    }
}
