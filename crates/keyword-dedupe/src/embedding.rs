//! Lazy embedding computation for keywords.
//!
//! [`EmbeddingEnsurer`] fills in missing vectors before candidate generation
//! and regenerates both vectors when the merge engine changes a keyword's
//! identity.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use keyword_embeddings::{embed_with_timeout, EmbeddingError, EmbeddingProvider};
use keyword_store::KeywordStore;
use keyword_types::{keyword::embedding_text, Keyword, KeywordId, KeywordUpdate, SimilarityMode};

use crate::error::DedupeError;

/// Default deadline per provider call.
pub const DEFAULT_EMBEDDING_TIMEOUT: Duration = Duration::from_secs(20);

/// Which vectors [`EmbeddingEnsurer::ensure`] had to compute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnsureOutcome {
    pub name_computed: bool,
    pub text_computed: bool,
}

impl EnsureOutcome {
    /// Number of vectors computed.
    pub fn computed(&self) -> usize {
        usize::from(self.name_computed) + usize::from(self.text_computed)
    }
}

/// Freshly computed vectors for a new keyword identity.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityEmbeddings {
    pub name_embedding: Vec<f32>,
    pub text_embedding: Vec<f32>,
}

/// Computes missing embeddings and writes them back to the store.
pub struct EmbeddingEnsurer {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn KeywordStore>,
    mode: SimilarityMode,
    timeout: Duration,
    persist: bool,
}

impl EmbeddingEnsurer {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn KeywordStore>,
        mode: SimilarityMode,
    ) -> Self {
        Self {
            provider,
            store,
            mode,
            timeout: DEFAULT_EMBEDDING_TIMEOUT,
            persist: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// When false, computed vectors stay in memory only (dry runs).
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Make sure `keyword` carries every vector the similarity mode needs.
    ///
    /// Each newly computed kind is written with its own `update` call. On
    /// error the keyword keeps whatever was computed before the failure.
    #[instrument(skip(self, keyword), fields(keyword = keyword.id))]
    pub async fn ensure(&self, keyword: &mut Keyword) -> Result<EnsureOutcome, DedupeError> {
        let mut outcome = EnsureOutcome::default();

        if !keyword.has_name_embedding() {
            let name = keyword.name.trim();
            if name.is_empty() {
                return Err(EmbeddingError::EmptyName(keyword.id).into());
            }
            let vector = self.embed(name).await?;
            self.persist(
                keyword.id,
                KeywordUpdate::new().with_name_embedding(vector.clone()),
            )
            .await?;
            keyword.name_embedding = Some(vector);
            outcome.name_computed = true;
        }

        if self.mode.requires_text_embedding() && !keyword.has_text_embedding() {
            let text = keyword.embedding_text();
            if text.is_empty() {
                return Err(EmbeddingError::EmptyText(keyword.id).into());
            }
            let vector = self.embed(&text).await?;
            self.persist(
                keyword.id,
                KeywordUpdate::new().with_text_embedding(vector.clone()),
            )
            .await?;
            keyword.text_embedding = Some(vector);
            outcome.text_computed = true;
        }

        if outcome.computed() > 0 {
            debug!(
                name = outcome.name_computed,
                text = outcome.text_computed,
                "Computed missing embeddings"
            );
        }
        Ok(outcome)
    }

    /// Compute both vectors for a proposed name and description.
    ///
    /// Nothing is written; the caller folds the vectors into its own update.
    pub async fn regenerate(
        &self,
        id: KeywordId,
        name: &str,
        description: Option<&str>,
    ) -> Result<IdentityEmbeddings, DedupeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EmbeddingError::EmptyName(id).into());
        }
        let text = embedding_text(name, description);

        let (name_embedding, text_embedding) =
            tokio::try_join!(self.embed(name), self.embed(&text))?;

        Ok(IdentityEmbeddings {
            name_embedding,
            text_embedding,
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        embed_with_timeout(self.provider.as_ref(), text, self.timeout).await
    }

    async fn persist(&self, id: KeywordId, update: KeywordUpdate) -> Result<(), DedupeError> {
        if self.persist {
            self.store.update(id, &update).await?;
        }
        Ok(())
    }
}
