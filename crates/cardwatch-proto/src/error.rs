//! Protocol error types.

use thiserror::Error;

/// Errors raised while reading ledger payloads.
#[derive(Debug, Error)]
pub enum Error {
    /// A payload could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A payload decoded but does not have the expected shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Deserialization(err.to_string())
    }
}
