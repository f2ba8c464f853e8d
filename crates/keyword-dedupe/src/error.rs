//! Dedupe error types.

use thiserror::Error;

use keyword_embeddings::EmbeddingError;
use keyword_store::StoreError;
use keyword_types::ConfigError;

/// Errors from the merge decision capability.
///
/// Always non-fatal: the secondary being decided is skipped.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// API request failed before a response arrived
    #[error("Decision API request failed: {0}")]
    Api(String),

    /// API answered with an error status
    #[error("Decision API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Rate limit exceeded
    #[error("Decision API rate limit exceeded")]
    RateLimited,

    /// Response was not a valid decision
    #[error("Malformed decision: {0}")]
    Malformed(String),

    /// Decider could not be configured
    #[error("Invalid decider configuration: {0}")]
    Config(String),
}

impl DecisionError {
    /// Transport failures, rate limits and 5xx answers may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            DecisionError::Api(_) | DecisionError::RateLimited => true,
            DecisionError::Status { status, .. } => *status >= 500,
            DecisionError::Malformed(_) | DecisionError::Config(_) => false,
        }
    }
}

/// Errors that can occur while running the dedupe pipeline.
#[derive(Debug, Error)]
pub enum DedupeError {
    /// Invalid configuration (fatal at startup)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Embedding error
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Decision error
    #[error(transparent)]
    Decision(#[from] DecisionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_retryable_classification() {
        assert!(DecisionError::RateLimited.is_retryable());
        assert!(DecisionError::Api("connection reset".into()).is_retryable());
        assert!(DecisionError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!DecisionError::Status {
            status: 401,
            body: "unauthorized".into()
        }
        .is_retryable());
        assert!(!DecisionError::Malformed("No choices in response".into()).is_retryable());
        assert!(!DecisionError::Config("x".into()).is_retryable());
    }
}
