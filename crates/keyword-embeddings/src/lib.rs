//! # keyword-embeddings
//!
//! Embedding generation for keyword deduplication.
//!
//! The pipeline only sees the [`EmbeddingProvider`] trait; [`OpenAiEmbedder`]
//! is the production implementation talking to an OpenAI-compatible
//! `/embeddings` endpoint.
//!
//! ## Features
//! - Async provider trait (object safe, `Send + Sync`)
//! - Per-call timeout with abort
//! - Bounded retries with exponential backoff on 429 / 5xx / transport errors

pub mod error;
pub mod openai;
pub mod provider;

pub use error::EmbeddingError;
pub use openai::{OpenAiEmbedder, OpenAiEmbedderConfig};
pub use provider::{embed_with_timeout, EmbeddingProvider, ProviderInfo};
