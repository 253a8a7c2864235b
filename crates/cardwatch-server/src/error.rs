//! Server error types.

use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Change detection error.
    #[error("core error: {0}")]
    Core(#[from] cardwatch_core::Error),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] cardwatch_proto::Error),

    /// A subscription filter could not be evaluated.
    #[error("predicate failure: {0}")]
    PredicateFailure(String),

    /// The feed processor is no longer accepting batches.
    #[error("feed closed")]
    FeedClosed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
