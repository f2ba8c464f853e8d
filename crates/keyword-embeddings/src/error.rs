//! Embedding error types.

use thiserror::Error;

/// Errors that can occur while computing embeddings.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Nothing to embed
    #[error("Empty input: nothing to embed")]
    EmptyInput,

    /// Keyword name is blank, so no name embedding can be computed
    #[error("Keyword {0} has a blank name")]
    EmptyName(i64),

    /// Keyword name and description are both blank
    #[error("Keyword {0} has neither name nor description text")]
    EmptyText(i64),

    /// Upstream provider failure (network, auth, bad payload)
    #[error("Embedding provider error: {0}")]
    Provider(String),

    /// Provider returned 429
    #[error("Embedding provider rate limit exceeded")]
    RateLimited,

    /// Call exceeded its deadline and was aborted
    #[error("Embedding call timed out after {0} ms")]
    Timeout(u64),

    /// Client could not be configured
    #[error("Invalid embedding configuration: {0}")]
    Config(String),
}

impl EmbeddingError {
    /// Whether a later attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Provider(_) | EmbeddingError::RateLimited | EmbeddingError::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(EmbeddingError::Timeout(20_000).is_retryable());
        assert!(EmbeddingError::RateLimited.is_retryable());
        assert!(!EmbeddingError::EmptyName(4).is_retryable());
        assert!(!EmbeddingError::Config("x".into()).is_retryable());
    }

    #[test]
    fn test_display_includes_keyword_id() {
        let msg = EmbeddingError::EmptyText(42).to_string();
        assert!(msg.contains("42"));
    }
}
