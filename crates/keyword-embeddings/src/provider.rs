//! Embedding provider trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Provider information
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// Provider name (e.g., "openai")
    pub name: String,
    /// Model name (e.g., "text-embedding-3-small")
    pub model: String,
    /// Output dimension, when known up front
    pub dimension: Option<usize>,
}

/// Trait for embedding providers.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
/// Callers guarantee `text` is not blank.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get provider information
    fn info(&self) -> &ProviderInfo;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Run `provider.embed` with a deadline.
///
/// The in-flight call is dropped (aborted) when the deadline passes.
pub async fn embed_with_timeout(
    provider: &dyn EmbeddingProvider,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>, EmbeddingError> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    match tokio::time::timeout(timeout, provider.embed(text)).await {
        Ok(result) => result,
        Err(_) => Err(EmbeddingError::Timeout(timeout.as_millis() as u64)),
    }
}
