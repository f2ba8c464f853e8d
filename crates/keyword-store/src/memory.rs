//! In-memory keyword store.
//!
//! Keeps a log of every successful mutation and can be told to fail writes
//! for specific ids, which makes it the store of choice for pipeline tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use keyword_types::{Keyword, KeywordId, KeywordUpdate};

use crate::error::StoreError;
use crate::store::{KeywordQuery, KeywordStore};

/// A successfully applied mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Update { id: KeywordId, update: KeywordUpdate },
    Delete { id: KeywordId },
}

impl Mutation {
    pub fn id(&self) -> KeywordId {
        match self {
            Mutation::Update { id, .. } | Mutation::Delete { id } => *id,
        }
    }
}

/// Keyword store held entirely in memory.
#[derive(Default)]
pub struct InMemoryStore {
    rows: RwLock<BTreeMap<KeywordId, Keyword>>,
    mutations: Mutex<Vec<Mutation>>,
    failing_writes: Mutex<HashSet<KeywordId>>,
    fail_fetch: AtomicBool,
    fetch_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with keywords.
    pub fn with_keywords(keywords: impl IntoIterator<Item = Keyword>) -> Self {
        let rows = keywords.into_iter().map(|k| (k.id, k)).collect();
        Self {
            rows: RwLock::new(rows),
            ..Default::default()
        }
    }

    /// Make every update/delete of `id` fail with [`StoreError::Injected`].
    pub async fn fail_writes_for(&self, id: KeywordId) {
        self.failing_writes.lock().await.insert(id);
    }

    /// Make `fetch` fail.
    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Current row for `id`.
    pub async fn get(&self, id: KeywordId) -> Option<Keyword> {
        self.rows.read().await.get(&id).cloned()
    }

    /// All rows, ascending id.
    pub async fn snapshot(&self) -> Vec<Keyword> {
        self.rows.read().await.values().cloned().collect()
    }

    /// Successful mutations in application order.
    pub async fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().await.clone()
    }

    /// Successful mutations touching `id`.
    pub async fn mutations_for(&self, id: KeywordId) -> Vec<Mutation> {
        self.mutations
            .lock()
            .await
            .iter()
            .filter(|m| m.id() == id)
            .cloned()
            .collect()
    }

    /// Number of `fetch` calls served.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    async fn check_writable(&self, id: KeywordId) -> Result<(), StoreError> {
        if self.failing_writes.lock().await.contains(&id) {
            return Err(StoreError::Injected(id));
        }
        Ok(())
    }
}

#[async_trait]
impl KeywordStore for InMemoryStore {
    async fn fetch(&self, query: &KeywordQuery) -> Result<Vec<Keyword>, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::Http("injected fetch failure".to_string()));
        }
        Ok(self
            .rows
            .read()
            .await
            .values()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn update(&self, id: KeywordId, update: &KeywordUpdate) -> Result<(), StoreError> {
        self.check_writable(id).await?;
        {
            let mut rows = self.rows.write().await;
            let row = rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            update.apply_to(row);
        }
        self.mutations.lock().await.push(Mutation::Update {
            id,
            update: update.clone(),
        });
        Ok(())
    }

    async fn delete(&self, id: KeywordId) -> Result<(), StoreError> {
        self.check_writable(id).await?;
        self.rows.write().await.remove(&id);
        self.mutations.lock().await.push(Mutation::Delete { id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryStore {
        InMemoryStore::with_keywords(vec![
            Keyword::new(3, "c"),
            Keyword::new(1, "a"),
            Keyword::new(2, "b"),
        ])
    }

    #[tokio::test]
    async fn test_fetch_is_ordered_and_paged() {
        let store = seeded();
        let all = store.fetch(&KeywordQuery::with_limit(10)).await.unwrap();
        let ids: Vec<_> = all.iter().map(|k| k.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let page = store
            .fetch(&KeywordQuery {
                limit: 1,
                offset: 1,
            })
            .await
            .unwrap();
        assert_eq!(page[0].id, 2);
    }

    #[tokio::test]
    async fn test_update_and_delete_are_logged() {
        let store = seeded();
        store
            .update(1, &KeywordUpdate::new().with_name("A"))
            .await
            .unwrap();
        store.delete(2).await.unwrap();

        assert_eq!(store.get(1).await.unwrap().name, "A");
        assert!(store.get(2).await.is_none());
        assert_eq!(store.mutations().await.len(), 2);
        assert_eq!(store.mutations_for(2).await, vec![Mutation::Delete { id: 2 }]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = seeded();
        store.delete(2).await.unwrap();
        store.delete(2).await.unwrap();
        assert_eq!(store.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let store = seeded();
        let result = store.update(99, &KeywordUpdate::new().with_name("x")).await;
        assert!(matches!(result, Err(StoreError::NotFound(99))));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = seeded();
        store.fail_writes_for(3).await;
        assert!(matches!(
            store.delete(3).await,
            Err(StoreError::Injected(3))
        ));
        assert!(store.mutations().await.is_empty());

        store.fail_fetch(true);
        assert!(store.fetch(&KeywordQuery::default()).await.is_err());
        assert_eq!(store.fetch_calls(), 1);
    }
}
