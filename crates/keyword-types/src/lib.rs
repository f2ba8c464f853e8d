//! # keyword-types
//!
//! Shared domain types for the keyword deduplication pipeline.
//!
//! - [`Keyword`]: a keyword record as stored in the graph database
//! - [`KeywordUpdate`]: partial update applied by the store adapters
//! - [`Settings`]: layered configuration (defaults -> file -> env -> CLI)
//!
//! ## Usage
//!
//! ```rust
//! use keyword_types::{Keyword, KeywordUpdate};
//!
//! let mut kw = Keyword::new(1, "Rust");
//! KeywordUpdate::new().with_name("Rust language").apply_to(&mut kw);
//! assert_eq!(kw.name, "Rust language");
//! ```

pub mod config;
pub mod error;
pub mod keyword;

pub use config::{
    DeciderSettings, DedupeSettings, EmbeddingSettings, MergeStrategy, Settings, SimilarityMode,
    StoreBackend, StoreSettings,
};
pub use error::ConfigError;
pub use keyword::{Keyword, KeywordId, KeywordUpdate};
