//! Store error types.

use thiserror::Error;

use keyword_types::KeywordId;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success HTTP status
    #[error("Store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Row does not exist
    #[error("Keyword not found: {0}")]
    NotFound(KeywordId),

    /// Store could not be configured
    #[error("Invalid store configuration: {0}")]
    Config(String),

    /// Failure injected by a test store
    #[error("Injected failure for keyword {0}")]
    Injected(KeywordId),
}
