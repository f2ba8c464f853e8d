//! Per-cluster merge engine.
//!
//! Secondaries are handled strictly in ascending id order. The primary's
//! identity is threaded through the loop as a [`PrimarySnapshot`] so each
//! decision sees the result of the previous merges. Failures are contained
//! to the secondary that caused them.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use keyword_store::KeywordStore;
use keyword_types::{ConfigError, Keyword, KeywordUpdate, MergeStrategy};

use crate::decision::{Decider, MergeDecision, PrimarySnapshot};
use crate::embedding::EmbeddingEnsurer;
use crate::error::DedupeError;

/// Merge engine settings.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub strategy: MergeStrategy,
    /// Delete a secondary once it has been merged into the primary
    pub delete_secondaries: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::Decide,
            delete_secondaries: true,
        }
    }
}

/// Counters for one cluster (or, after [`ClusterOutcome::merge`], many).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterOutcome {
    pub merged: usize,
    pub renamed: usize,
    pub deleted: usize,
    pub rename_noops: usize,
    pub skipped: usize,
    pub decision_failures: usize,
    pub mutation_failures: usize,
}

impl ClusterOutcome {
    /// True if at least one merge or delete landed.
    pub fn applied(&self) -> bool {
        self.merged > 0 || self.deleted > 0
    }

    /// Accumulate counters from another outcome.
    pub fn merge(&mut self, other: &ClusterOutcome) {
        self.merged += other.merged;
        self.renamed += other.renamed;
        self.deleted += other.deleted;
        self.rename_noops += other.rename_noops;
        self.skipped += other.skipped;
        self.decision_failures += other.decision_failures;
        self.mutation_failures += other.mutation_failures;
    }
}

/// Applies merge decisions to clusters.
pub struct MergeEngine {
    store: Arc<dyn KeywordStore>,
    ensurer: Arc<EmbeddingEnsurer>,
    decider: Option<Arc<dyn Decider>>,
    config: MergeConfig,
}

impl MergeEngine {
    /// Create a merge engine. The `Decide` strategy needs a decider.
    pub fn new(
        store: Arc<dyn KeywordStore>,
        ensurer: Arc<EmbeddingEnsurer>,
        decider: Option<Arc<dyn Decider>>,
        config: MergeConfig,
    ) -> Result<Self, DedupeError> {
        if config.strategy == MergeStrategy::Decide && decider.is_none() {
            return Err(ConfigError::Missing("decider").into());
        }
        Ok(Self {
            store,
            ensurer,
            decider,
            config,
        })
    }

    /// Apply the configured strategy to one cluster.
    ///
    /// `members` may come in any order; the lowest id is the primary.
    pub async fn apply_cluster(&self, members: &[Keyword]) -> ClusterOutcome {
        let mut members = members.to_vec();
        members.sort_by_key(|k| k.id);

        let Some((primary, secondaries)) = members.split_first() else {
            return ClusterOutcome::default();
        };
        if secondaries.is_empty() {
            return ClusterOutcome::default();
        }

        let outcome = match (self.config.strategy, &self.decider) {
            (MergeStrategy::Aggressive, _) => self.delete_all(primary, secondaries).await,
            (MergeStrategy::Decide, Some(decider)) => {
                self.decide_each(decider.as_ref(), primary, secondaries).await
            }
            (MergeStrategy::Decide, None) => ClusterOutcome {
                decision_failures: secondaries.len(),
                ..Default::default()
            },
        };

        debug!(
            cluster = primary.id,
            size = members.len(),
            merged = outcome.merged,
            renamed = outcome.renamed,
            deleted = outcome.deleted,
            skipped = outcome.skipped,
            "Cluster processed"
        );
        outcome
    }

    async fn delete_all(&self, primary: &Keyword, secondaries: &[Keyword]) -> ClusterOutcome {
        let mut outcome = ClusterOutcome::default();
        for secondary in secondaries {
            match self.store.delete(secondary.id).await {
                Ok(()) => {
                    outcome.deleted += 1;
                    info!(
                        cluster = primary.id,
                        primary = primary.id,
                        secondary = secondary.id,
                        name = %secondary.name,
                        "Deleted duplicate keyword"
                    );
                }
                Err(e) => {
                    outcome.mutation_failures += 1;
                    warn!(
                        cluster = primary.id,
                        primary = primary.id,
                        secondary = secondary.id,
                        phase = "delete_secondary",
                        error = %e,
                        "Mutation failed"
                    );
                }
            }
        }
        outcome
    }

    async fn decide_each(
        &self,
        decider: &dyn Decider,
        primary: &Keyword,
        secondaries: &[Keyword],
    ) -> ClusterOutcome {
        let mut outcome = ClusterOutcome::default();
        let mut snapshot = PrimarySnapshot::from(primary);

        for secondary in secondaries {
            let decision = match decider.decide(&snapshot, secondary).await {
                Ok(decision) => decision,
                Err(e) => {
                    outcome.decision_failures += 1;
                    warn!(
                        cluster = primary.id,
                        primary = snapshot.id,
                        secondary = secondary.id,
                        phase = "decide",
                        error = %e,
                        "Decision failed, skipping secondary"
                    );
                    continue;
                }
            };

            debug!(
                cluster = primary.id,
                primary = snapshot.id,
                secondary = secondary.id,
                action = decision.action(),
                "Applying decision"
            );

            match decision {
                MergeDecision::Skip => outcome.skipped += 1,
                MergeDecision::Rename {
                    keyword,
                    description,
                } => {
                    self.rename(&snapshot, secondary, &keyword, description, &mut outcome)
                        .await
                }
                MergeDecision::Merge {
                    keyword,
                    description,
                } => {
                    self.merge_into(&mut snapshot, secondary, keyword, description, &mut outcome)
                        .await
                }
            }
        }
        outcome
    }

    async fn rename(
        &self,
        snapshot: &PrimarySnapshot,
        secondary: &Keyword,
        proposed: &str,
        description: Option<String>,
        outcome: &mut ClusterOutcome,
    ) {
        let new_name = proposed.trim();
        if new_name.is_empty()
            || new_name == secondary.name.trim()
            || new_name == snapshot.name.trim()
        {
            outcome.rename_noops += 1;
            debug!(
                primary = snapshot.id,
                secondary = secondary.id,
                proposed,
                "Rename would not change anything"
            );
            return;
        }

        let description = non_blank(description.as_deref());
        let effective_description = description
            .clone()
            .or_else(|| secondary.description.clone());

        let vectors = match self
            .ensurer
            .regenerate(secondary.id, new_name, effective_description.as_deref())
            .await
        {
            Ok(vectors) => vectors,
            Err(e) => {
                self.fail(snapshot, secondary, "regenerate", &e, outcome);
                return;
            }
        };

        let mut update = KeywordUpdate::new()
            .with_name(new_name)
            .with_name_embedding(vectors.name_embedding)
            .with_text_embedding(vectors.text_embedding);
        if description.is_some() {
            update = update.with_description(description);
        }

        match self.store.update(secondary.id, &update).await {
            Ok(()) => {
                outcome.renamed += 1;
                info!(
                    primary = snapshot.id,
                    secondary = secondary.id,
                    from = %secondary.name,
                    to = new_name,
                    "Renamed keyword"
                );
            }
            Err(e) => self.fail(snapshot, secondary, "rename", &e.into(), outcome),
        }
    }

    async fn merge_into(
        &self,
        snapshot: &mut PrimarySnapshot,
        secondary: &Keyword,
        proposed_name: Option<String>,
        proposed_description: Option<String>,
        outcome: &mut ClusterOutcome,
    ) {
        let merged_name = non_blank(proposed_name.as_deref()).unwrap_or_else(|| snapshot.name.clone());
        let merged_description = non_blank(proposed_description.as_deref()).or_else(|| {
            join_descriptions(
                snapshot.description.as_deref(),
                secondary.description.as_deref(),
            )
        });

        let vectors = match self
            .ensurer
            .regenerate(snapshot.id, &merged_name, merged_description.as_deref())
            .await
        {
            Ok(vectors) => vectors,
            Err(e) => {
                self.fail(snapshot, secondary, "regenerate", &e, outcome);
                return;
            }
        };

        let update = KeywordUpdate::new()
            .with_name(merged_name.clone())
            .with_description(merged_description.clone())
            .with_name_embedding(vectors.name_embedding)
            .with_text_embedding(vectors.text_embedding);

        if let Err(e) = self.store.update(snapshot.id, &update).await {
            self.fail(snapshot, secondary, "update_primary", &e.into(), outcome);
            return;
        }

        info!(
            primary = snapshot.id,
            secondary = secondary.id,
            from = %secondary.name,
            into = %merged_name,
            "Merged keyword"
        );
        snapshot.name = merged_name;
        snapshot.description = merged_description;
        outcome.merged += 1;

        if !self.config.delete_secondaries {
            warn!(
                primary = snapshot.id,
                secondary = secondary.id,
                "Secondary kept as orphaned duplicate"
            );
            return;
        }

        match self.store.delete(secondary.id).await {
            Ok(()) => outcome.deleted += 1,
            Err(e) => self.fail(snapshot, secondary, "delete_secondary", &e.into(), outcome),
        }
    }

    fn fail(
        &self,
        snapshot: &PrimarySnapshot,
        secondary: &Keyword,
        phase: &'static str,
        error: &DedupeError,
        outcome: &mut ClusterOutcome,
    ) {
        outcome.mutation_failures += 1;
        warn!(
            cluster = snapshot.id,
            primary = snapshot.id,
            secondary = secondary.id,
            phase,
            error = %error,
            "Mutation failed, continuing with next secondary"
        );
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Join the non-blank descriptions with a blank line, dropping a repeat.
fn join_descriptions(primary: Option<&str>, secondary: Option<&str>) -> Option<String> {
    match (non_blank(primary), non_blank(secondary)) {
        (Some(p), Some(s)) if p == s => Some(p),
        (Some(p), Some(s)) => Some(format!("{p}\n\n{s}")),
        (Some(p), None) => Some(p),
        (None, s) => s,
    }
}
