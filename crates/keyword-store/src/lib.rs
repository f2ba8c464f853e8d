//! # keyword-store
//!
//! Key-addressed CRUD over keyword rows.
//!
//! The dedupe pipeline talks to a [`KeywordStore`]; three backends ship here:
//! - [`SupabaseStore`]: PostgREST table (production)
//! - [`JsonFileStore`]: a JSON array on disk (offline runs, fixtures)
//! - [`InMemoryStore`]: map with a mutation log and fault injection (tests)
//!
//! `update` and `delete` are idempotent in every backend.

pub mod error;
pub mod json_file;
pub mod memory;
pub mod store;
pub mod supabase;

pub use error::StoreError;
pub use json_file::JsonFileStore;
pub use memory::{InMemoryStore, Mutation};
pub use store::{KeywordQuery, KeywordStore};
pub use supabase::{SupabaseConfig, SupabaseStore};
