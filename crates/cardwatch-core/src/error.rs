//! Core error types.

use thiserror::Error;

/// Errors raised while diffing commits and reading card state.
///
/// None of these are fatal: the differ records them as per-commit
/// diagnostics and carries on with the rest of the batch.
#[derive(Debug, Error)]
pub enum Error {
    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] cardwatch_proto::Error),

    /// A committed card could not be read back from the store.
    #[error("card {card_id} not found after applying its commit")]
    LookupFailure { card_id: String },

    /// The store rejected a commit.
    #[error("failed to apply commit to card {card_id}: {reason}")]
    ApplyFailure { card_id: String, reason: String },

    /// An `EXECUTE_COMMAND` action could not be decoded.
    #[error("malformed command action {action_id}: {reason}")]
    MalformedCommand { action_id: String, reason: String },

    /// A card type reference does not resolve to a configured type.
    #[error("unknown card type reference: {0}")]
    UnknownTypeRef(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Metrics bucket for a per-commit diagnostic.
    pub fn failure_kind(&self) -> Option<crate::metrics::FailureKind> {
        use crate::metrics::FailureKind;
        match self {
            Error::ApplyFailure { .. } => Some(FailureKind::Apply),
            Error::LookupFailure { .. } => Some(FailureKind::Lookup),
            Error::MalformedCommand { .. } => Some(FailureKind::MalformedCommand),
            _ => None,
        }
    }
}
