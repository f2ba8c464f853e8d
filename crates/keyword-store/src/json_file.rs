//! JSON-file keyword store.
//!
//! The file holds a JSON array of keyword records. Every mutation rewrites
//! the whole file through a temp file + rename so a crash never leaves a
//! half-written array behind. The in-memory rows only change once the file
//! write has succeeded, so a failed mutation leaves no trace.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use keyword_types::{Keyword, KeywordId, KeywordUpdate};

use crate::error::StoreError;
use crate::store::{KeywordQuery, KeywordStore};

/// Keyword store backed by a JSON array file.
pub struct JsonFileStore {
    path: PathBuf,
    rows: Mutex<BTreeMap<KeywordId, Keyword>>,
}

impl JsonFileStore {
    /// Open an existing keyword file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path).await?;
        let keywords: Vec<Keyword> = serde_json::from_slice(&bytes)?;
        info!(path = ?path, count = keywords.len(), "Opened keyword file");

        let rows = keywords.into_iter().map(|k| (k.id, k)).collect();
        Ok(Self {
            path,
            rows: Mutex::new(rows),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, rows: &BTreeMap<KeywordId, Keyword>) -> Result<(), StoreError> {
        let keywords: Vec<&Keyword> = rows.values().collect();
        let bytes = serde_json::to_vec_pretty(&keywords)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = ?self.path, rows = rows.len(), "Persisted keyword file");
        Ok(())
    }
}

#[async_trait]
impl KeywordStore for JsonFileStore {
    async fn fetch(&self, query: &KeywordQuery) -> Result<Vec<Keyword>, StoreError> {
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn update(&self, id: KeywordId, update: &KeywordUpdate) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        let mut next = rows.clone();
        let row = next.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        update.apply_to(row);
        self.persist(&next).await?;
        *rows = next;
        Ok(())
    }

    async fn delete(&self, id: KeywordId) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        if !rows.contains_key(&id) {
            return Ok(());
        }
        let mut next = rows.clone();
        next.remove(&id);
        self.persist(&next).await?;
        *rows = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_fixture(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("keywords.json");
        let keywords = vec![
            Keyword::new(1, "Trump"),
            Keyword::new(2, "Donald Trump").with_description("US president"),
        ];
        tokio::fs::write(&path, serde_json::to_vec(&keywords).unwrap())
            .await
            .unwrap();
        path
    }

    #[tokio::test]
    async fn test_open_and_fetch() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir).await;

        let store = JsonFileStore::open(&path).await.unwrap();
        let keywords = store.fetch(&KeywordQuery::default()).await.unwrap();
        assert_eq!(keywords.len(), 2);
        assert_eq!(keywords[1].description.as_deref(), Some("US president"));
    }

    #[tokio::test]
    async fn test_mutations_are_persisted() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir).await;

        let store = JsonFileStore::open(&path).await.unwrap();
        store
            .update(1, &KeywordUpdate::new().with_name("Donald J. Trump"))
            .await
            .unwrap();
        store.delete(2).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let keywords = reopened.fetch(&KeywordQuery::default()).await.unwrap();
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].name, "Donald J. Trump");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_rows_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir).await;
        let store = JsonFileStore::open(&path).await.unwrap();

        // A directory in the temp file's place makes the write fail.
        let blocker = path.with_extension("json.tmp");
        tokio::fs::create_dir(&blocker).await.unwrap();

        let result = store
            .update(1, &KeywordUpdate::new().with_name("MERGED"))
            .await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(store.delete(2).await.is_err());

        let keywords = store.fetch(&KeywordQuery::default()).await.unwrap();
        assert_eq!(keywords.len(), 2);
        assert_eq!(keywords[0].name, "Trump");

        // The next successful write must not carry the failed update along.
        tokio::fs::remove_dir(&blocker).await.unwrap();
        store
            .update(2, &KeywordUpdate::new().with_name("Donald J. Trump"))
            .await
            .unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let keywords = reopened.fetch(&KeywordQuery::default()).await.unwrap();
        assert_eq!(keywords.len(), 2);
        assert_eq!(keywords[0].name, "Trump");
        assert_eq!(keywords[1].name, "Donald J. Trump");
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = JsonFileStore::open(dir.path().join("nope.json")).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
    }
}
