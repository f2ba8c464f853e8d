//! # keyword-dedupe
//!
//! Finds and merges duplicate keywords.
//!
//! A run fetches keywords, fills in missing embeddings, scores every pair by
//! cosine similarity, keeps the strongest pairs per keyword, groups them into
//! clusters with union-find and, when applying, merges each cluster into its
//! oldest member. Merges are adjudicated per secondary by a [`Decider`]
//! (normally [`LlmDecider`]) unless the aggressive strategy is selected.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pipeline = DedupePipeline::new(store, embedder, Some(decider), config)?;
//! let summary = pipeline.run().await?;
//! println!("{} clusters, {} merged", summary.clusters, summary.clusters_merged);
//! ```

pub mod candidates;
pub mod cluster;
pub mod decision;
pub mod embedding;
pub mod error;
pub mod llm_decider;
pub mod merge;
pub mod pipeline;
pub mod similarity;
pub mod worker_pool;

pub use candidates::{build_candidates, CandidateConfig, CandidateSet, SimilarityPair};
pub use cluster::{cluster_pairs, Cluster, UnionFind};
pub use decision::{Decider, MergeDecision, PrimarySnapshot};
pub use embedding::{EmbeddingEnsurer, EnsureOutcome, IdentityEmbeddings};
pub use error::{DecisionError, DedupeError};
pub use llm_decider::{LlmDecider, LlmDeciderConfig};
pub use merge::{ClusterOutcome, MergeConfig, MergeEngine};
pub use pipeline::{ClusterPreview, DedupePipeline, PipelineConfig, RunSummary};
pub use similarity::{cosine_similarity, pair_score};
pub use worker_pool::run_bounded;
