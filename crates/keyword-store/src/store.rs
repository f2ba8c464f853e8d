//! Keyword store trait.

use async_trait::async_trait;

use keyword_types::{Keyword, KeywordId, KeywordUpdate};

use crate::error::StoreError;

/// Page request for [`KeywordStore::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordQuery {
    /// Maximum rows returned
    pub limit: usize,
    /// Rows skipped, in id order
    pub offset: usize,
}

impl KeywordQuery {
    pub fn with_limit(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }
}

impl Default for KeywordQuery {
    fn default() -> Self {
        Self::with_limit(5000)
    }
}

/// Key-addressed CRUD over keyword rows.
///
/// Concurrent reads and concurrent writes to different ids need no
/// coordination. `update` and `delete` must be idempotent.
#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// Fetch keywords ordered by ascending id.
    async fn fetch(&self, query: &KeywordQuery) -> Result<Vec<Keyword>, StoreError>;

    /// Apply a partial update to one keyword.
    async fn update(&self, id: KeywordId, update: &KeywordUpdate) -> Result<(), StoreError>;

    /// Delete one keyword. Deleting a missing id succeeds.
    async fn delete(&self, id: KeywordId) -> Result<(), StoreError>;
}
