//! Supabase (PostgREST) keyword store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument};

use keyword_types::{Keyword, KeywordId, KeywordUpdate};

use crate::error::StoreError;
use crate::store::{KeywordQuery, KeywordStore};

/// PostgREST caps responses at 1000 rows by default.
const PAGE_SIZE: usize = 1000;

const SELECT_COLUMNS: &str = "id,name,description,text_embedding,name_embedding";

/// Configuration for [`SupabaseStore`].
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL (e.g., "https://abc.supabase.co")
    pub url: String,
    /// Service role key
    pub api_key: SecretString,
    /// Keyword table name
    pub table: String,
    /// Request timeout
    pub timeout: Duration,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: SecretString::from(api_key.into()),
            table: "keywords".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Keyword store backed by a Supabase table.
pub struct SupabaseStore {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig) -> Result<Self, StoreError> {
        if config.url.trim().is_empty() {
            return Err(StoreError::Config("missing Supabase URL".to_string()));
        }
        if config.api_key.expose_secret().trim().is_empty() {
            return Err(StoreError::Config("missing Supabase API key".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;

        let endpoint = format!(
            "{}/rest/v1/{}",
            config.url.trim_end_matches('/'),
            config.table
        );

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let key = self.api_key.expose_secret();
        request
            .header("apikey", key)
            .header("Authorization", format!("Bearer {key}"))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }
        Ok(response)
    }

    async fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<Keyword>, StoreError> {
        let request = self.client.get(&self.endpoint).query(&[
            ("select", SELECT_COLUMNS.to_string()),
            ("order", "id.asc".to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        let rows: Vec<KeywordRow> = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Http(format!("bad response body: {e}")))?;
        Ok(rows.into_iter().map(Keyword::from).collect())
    }
}

#[async_trait]
impl KeywordStore for SupabaseStore {
    #[instrument(skip(self))]
    async fn fetch(&self, query: &KeywordQuery) -> Result<Vec<Keyword>, StoreError> {
        let mut keywords = Vec::new();
        let mut offset = query.offset;

        while keywords.len() < query.limit {
            let want = (query.limit - keywords.len()).min(PAGE_SIZE);
            let page = self.fetch_page(want, offset).await?;
            let got = page.len();
            debug!(offset, got, "Fetched keyword page");

            keywords.extend(page);
            offset += got;
            if got < want {
                break;
            }
        }
        Ok(keywords)
    }

    async fn update(&self, id: KeywordId, update: &KeywordUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }
        let request = self
            .client
            .patch(&self.endpoint)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(update);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, id: KeywordId) -> Result<(), StoreError> {
        let request = self
            .client
            .delete(&self.endpoint)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal");
        self.send(request).await?;
        Ok(())
    }
}

/// Row as returned by PostgREST. pgvector columns may come back as a JSON
/// array or as their text form `"[0.1,0.2]"`.
#[derive(Debug, Deserialize)]
struct KeywordRow {
    id: KeywordId,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_vector")]
    text_embedding: Option<Vec<f32>>,
    #[serde(default, deserialize_with = "deserialize_vector")]
    name_embedding: Option<Vec<f32>>,
}

impl From<KeywordRow> for Keyword {
    fn from(row: KeywordRow) -> Self {
        Keyword {
            id: row.id,
            name: row.name,
            description: row.description,
            text_embedding: row.text_embedding,
            name_embedding: row.name_embedding,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VectorColumn {
    List(Vec<f32>),
    Text(String),
}

fn deserialize_vector<'de, D>(deserializer: D) -> Result<Option<Vec<f32>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<VectorColumn>::deserialize(deserializer)? {
        None => Ok(None),
        Some(VectorColumn::List(values)) => Ok(Some(values)),
        Some(VectorColumn::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(VectorColumn::Text(text)) => serde_json::from_str(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
