//! Dedupe run orchestration.
//!
//! Phases, in order: fetch, ensure embeddings, build candidates, cluster,
//! then either report (dry run) or merge. Only a failed fetch aborts a run;
//! everything later is contained per keyword, pair or secondary and counted
//! in the [`RunSummary`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use ulid::Ulid;

use keyword_embeddings::EmbeddingProvider;
use keyword_store::{KeywordQuery, KeywordStore};
use keyword_types::{Keyword, KeywordId, Settings};

use crate::candidates::{build_candidates, CandidateConfig, SimilarityPair};
use crate::cluster::{cluster_pairs, Cluster};
use crate::decision::Decider;
use crate::embedding::{EmbeddingEnsurer, DEFAULT_EMBEDDING_TIMEOUT};
use crate::error::DedupeError;
use crate::merge::{ClusterOutcome, MergeConfig, MergeEngine};
use crate::worker_pool::run_bounded;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Report only, never mutate the store
    pub dry_run: bool,
    /// Maximum keywords fetched
    pub fetch_limit: usize,
    /// Concurrent embedding tasks
    pub embedding_concurrency: usize,
    /// Deadline per embedding call
    pub embedding_timeout: Duration,
    pub candidates: CandidateConfig,
    /// Drop clusters larger than this
    pub max_cluster_size: Option<usize>,
    /// Concurrent cluster merge tasks
    pub merge_concurrency: usize,
    pub merge: MergeConfig,
    /// Clusters listed in the summary (None = all)
    pub preview_clusters: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            fetch_limit: 5000,
            embedding_concurrency: 30,
            embedding_timeout: DEFAULT_EMBEDDING_TIMEOUT,
            candidates: CandidateConfig::default(),
            max_cluster_size: None,
            merge_concurrency: 60,
            merge: MergeConfig::default(),
            preview_clusters: None,
        }
    }
}

impl PipelineConfig {
    /// Build from validated settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let dedupe = &settings.dedupe;
        Self {
            dry_run: !dedupe.apply,
            fetch_limit: dedupe.fetch_limit,
            embedding_concurrency: settings.embeddings.concurrency,
            embedding_timeout: Duration::from_secs(settings.embeddings.timeout_secs),
            candidates: CandidateConfig {
                threshold: dedupe.effective_threshold(),
                max_neighbors: dedupe.max_neighbors,
                mode: dedupe.mode,
                top_k: dedupe.top_k,
            },
            max_cluster_size: dedupe.max_cluster_size,
            merge_concurrency: dedupe.merge_concurrency,
            merge: MergeConfig {
                strategy: dedupe.strategy,
                delete_secondaries: dedupe.delete_secondaries,
            },
            preview_clusters: dedupe.preview_clusters,
        }
    }
}

/// One cluster as shown in reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterPreview {
    pub primary: KeywordId,
    pub members: Vec<KeywordId>,
    pub names: Vec<String>,
}

/// Result of a dedupe run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub keywords_fetched: usize,
    pub embeddings_computed: usize,
    pub embedding_failures: usize,
    /// Keyword pairs scored
    pub candidates: usize,
    /// Pairs accepted after threshold and neighbor cap
    pub pairs: usize,
    pub clusters: usize,
    pub clusters_merged: usize,
    pub keywords_deleted: usize,
    pub keywords_renamed: usize,
    pub rename_noops: usize,
    pub decisions_skipped: usize,
    pub decision_failures: usize,
    pub mutation_failures: usize,
    pub top_pairs: Vec<SimilarityPair>,
    pub cluster_preview: Vec<ClusterPreview>,
}

impl RunSummary {
    /// Empty summary for a run starting now.
    pub fn new(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id: Ulid::new().to_string(),
            started_at: now,
            finished_at: now,
            dry_run,
            keywords_fetched: 0,
            embeddings_computed: 0,
            embedding_failures: 0,
            candidates: 0,
            pairs: 0,
            clusters: 0,
            clusters_merged: 0,
            keywords_deleted: 0,
            keywords_renamed: 0,
            rename_noops: 0,
            decisions_skipped: 0,
            decision_failures: 0,
            mutation_failures: 0,
            top_pairs: Vec::new(),
            cluster_preview: Vec::new(),
        }
    }

    fn absorb(&mut self, outcome: &ClusterOutcome) {
        if outcome.applied() {
            self.clusters_merged += 1;
        }
        self.keywords_deleted += outcome.deleted;
        self.keywords_renamed += outcome.renamed;
        self.rename_noops += outcome.rename_noops;
        self.decisions_skipped += outcome.skipped;
        self.decision_failures += outcome.decision_failures;
        self.mutation_failures += outcome.mutation_failures;
    }

    /// Wall-clock duration of the run.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Keyword deduplication pipeline.
pub struct DedupePipeline {
    store: Arc<dyn KeywordStore>,
    ensurer: Arc<EmbeddingEnsurer>,
    merge_engine: Option<MergeEngine>,
    config: PipelineConfig,
}

impl DedupePipeline {
    /// Wire the pipeline.
    ///
    /// A decider is only required when the run applies changes with the
    /// `Decide` strategy.
    pub fn new(
        store: Arc<dyn KeywordStore>,
        provider: Arc<dyn EmbeddingProvider>,
        decider: Option<Arc<dyn Decider>>,
        config: PipelineConfig,
    ) -> Result<Self, DedupeError> {
        let ensurer = Arc::new(
            EmbeddingEnsurer::new(provider, store.clone(), config.candidates.mode)
                .with_timeout(config.embedding_timeout)
                .with_persist(!config.dry_run),
        );

        let merge_engine = if config.dry_run {
            None
        } else {
            Some(MergeEngine::new(
                store.clone(),
                ensurer.clone(),
                decider,
                config.merge.clone(),
            )?)
        };

        Ok(Self {
            store,
            ensurer,
            merge_engine,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one run.
    #[instrument(skip(self), fields(dry_run = self.config.dry_run))]
    pub async fn run(&self) -> Result<RunSummary, DedupeError> {
        let mut summary = RunSummary::new(self.config.dry_run);
        info!(run_id = %summary.run_id, "Starting dedupe run");

        let query = KeywordQuery::with_limit(self.config.fetch_limit);
        let keywords = self.store.fetch(&query).await?;
        summary.keywords_fetched = keywords.len();
        info!(count = keywords.len(), "Fetched keywords");

        let keywords = self.ensure_embeddings(keywords, &mut summary).await;
        let eligible: Vec<Keyword> = keywords
            .into_iter()
            .filter(Keyword::has_name_embedding)
            .collect();

        let candidates = build_candidates(&eligible, &self.config.candidates);
        summary.candidates = candidates.compared;
        summary.pairs = candidates.pairs.len();
        summary.top_pairs = candidates.top_pairs;

        let clusters = cluster_pairs(&candidates.pairs, self.config.max_cluster_size);
        summary.clusters = clusters.len();
        info!(
            pairs = summary.pairs,
            clusters = summary.clusters,
            "Clustered candidates"
        );

        let by_id: HashMap<KeywordId, &Keyword> = eligible.iter().map(|k| (k.id, k)).collect();
        let previews: Vec<ClusterPreview> = clusters.iter().map(|c| preview(c, &by_id)).collect();

        match &self.merge_engine {
            None => {
                for cluster in &previews {
                    info!(
                        primary = cluster.primary,
                        members = ?cluster.names,
                        "Would merge cluster"
                    );
                }
            }
            Some(engine) => {
                let member_lists: Vec<Vec<Keyword>> = clusters
                    .iter()
                    .map(|c| {
                        c.members()
                            .iter()
                            .filter_map(|id| by_id.get(id).map(|k| (*k).clone()))
                            .collect()
                    })
                    .collect();

                let outcomes = run_bounded(&member_lists, self.config.merge_concurrency, |members| {
                    engine.apply_cluster(members)
                })
                .await;
                for outcome in &outcomes {
                    summary.absorb(outcome);
                }
            }
        }

        summary.cluster_preview = match self.config.preview_clusters {
            Some(limit) => previews.into_iter().take(limit).collect(),
            None => previews,
        };

        summary.finished_at = Utc::now();
        info!(
            run_id = %summary.run_id,
            dry_run = summary.dry_run,
            keywords = summary.keywords_fetched,
            embeddings_computed = summary.embeddings_computed,
            embedding_failures = summary.embedding_failures,
            clusters = summary.clusters,
            clusters_merged = summary.clusters_merged,
            deleted = summary.keywords_deleted,
            renamed = summary.keywords_renamed,
            decision_failures = summary.decision_failures,
            mutation_failures = summary.mutation_failures,
            duration_ms = summary.duration_ms(),
            "Dedupe run complete"
        );
        Ok(summary)
    }

    /// Fill in missing vectors across the embedding pool.
    async fn ensure_embeddings(
        &self,
        keywords: Vec<Keyword>,
        summary: &mut RunSummary,
    ) -> Vec<Keyword> {
        let ensurer = self.ensurer.as_ref();
        let results = run_bounded(&keywords, self.config.embedding_concurrency, |keyword| async move {
            let mut keyword = keyword.clone();
            let result = ensurer.ensure(&mut keyword).await;
            (keyword, result)
        })
        .await;

        let mut ensured = Vec::with_capacity(results.len());
        for (keyword, result) in results {
            match result {
                Ok(outcome) => summary.embeddings_computed += outcome.computed(),
                Err(e) => {
                    summary.embedding_failures += 1;
                    warn!(
                        keyword = keyword.id,
                        name = %keyword.name,
                        phase = "embedding",
                        error = %e,
                        "Embedding failed, keyword skipped"
                    );
                }
            }
            ensured.push(keyword);
        }
        ensured
    }
}

fn preview(cluster: &Cluster, by_id: &HashMap<KeywordId, &Keyword>) -> ClusterPreview {
    ClusterPreview {
        primary: cluster.primary(),
        members: cluster.members().to_vec(),
        names: cluster
            .members()
            .iter()
            .filter_map(|id| by_id.get(id).map(|k| k.name.clone()))
            .collect(),
    }
}
