//! Shared test doubles for keyword-dedupe integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use keyword_dedupe::{
    CandidateConfig, Decider, DecisionError, DedupePipeline, MergeConfig, MergeDecision,
    PipelineConfig, PrimarySnapshot,
};
use keyword_embeddings::{EmbeddingError, EmbeddingProvider, ProviderInfo};
use keyword_store::InMemoryStore;
use keyword_types::{Keyword, KeywordId, MergeStrategy, SimilarityMode};

/// Embedder that looks texts up in a table.
///
/// Unknown texts get a fixed fallback vector; texts registered as slow sleep
/// before answering.
pub struct TableEmbedder {
    info: ProviderInfo,
    vectors: HashMap<String, Vec<f32>>,
    slow: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl TableEmbedder {
    pub fn new() -> Self {
        Self {
            info: ProviderInfo {
                name: "table".to_string(),
                model: "test".to_string(),
                dimension: Some(3),
            },
            vectors: HashMap::new(),
            slow: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn slow(mut self, text: &str, delay: Duration) -> Self {
        self.slow.insert(text.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(delay) = self.slow.get(text) {
            tokio::time::sleep(*delay).await;
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
    }
}

/// One recorded `decide` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DecideCall {
    pub primary: PrimarySnapshot,
    pub secondary: KeywordId,
}

/// Decider replaying a script; answers `Skip` once the script runs out.
pub struct ScriptedDecider {
    script: Mutex<VecDeque<Result<MergeDecision, DecisionError>>>,
    calls: Mutex<Vec<DecideCall>>,
}

impl ScriptedDecider {
    pub fn new(script: Vec<Result<MergeDecision, DecisionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always merge, keeping the primary's name.
    pub fn always_merge() -> Self {
        Self::new((0..32).map(|_| Ok(merge(None))).collect())
    }

    pub fn calls(&self) -> Vec<DecideCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Decider for ScriptedDecider {
    async fn decide(
        &self,
        primary: &PrimarySnapshot,
        secondary: &Keyword,
    ) -> Result<MergeDecision, DecisionError> {
        self.calls.lock().unwrap().push(DecideCall {
            primary: primary.clone(),
            secondary: secondary.id,
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(MergeDecision::Skip))
    }
}

pub fn merge(keyword: Option<&str>) -> MergeDecision {
    MergeDecision::Merge {
        keyword: keyword.map(str::to_string),
        description: None,
    }
}

pub fn rename(keyword: &str) -> MergeDecision {
    MergeDecision::Rename {
        keyword: keyword.to_string(),
        description: None,
    }
}

/// Keyword with a preset name embedding.
pub fn keyword(id: KeywordId, name: &str, embedding: Vec<f32>) -> Keyword {
    Keyword::new(id, name).with_name_embedding(embedding)
}

/// Unit vector in the x/y plane whose cosine with [1, 0, 0] is `cos`.
pub fn near_x(cos: f32) -> Vec<f32> {
    vec![cos, (1.0 - cos * cos).max(0.0).sqrt(), 0.0]
}

/// "Trump", "Donald Trump" (0.95 apart) and an unrelated "Bananas".
pub fn trump_keywords() -> Vec<Keyword> {
    vec![
        keyword(1, "Trump", vec![1.0, 0.0, 0.0]),
        keyword(2, "Donald Trump", near_x(0.95)),
        keyword(3, "Bananas", vec![0.0, 0.0, 1.0]),
    ]
}

/// Name-only config applying changes at threshold 0.7.
pub fn apply_config(strategy: MergeStrategy) -> PipelineConfig {
    PipelineConfig {
        dry_run: false,
        candidates: CandidateConfig {
            threshold: 0.7,
            mode: SimilarityMode::NameOnly,
            ..Default::default()
        },
        merge: MergeConfig {
            strategy,
            delete_secondaries: true,
        },
        ..Default::default()
    }
}

pub fn build_pipeline(
    store: &Arc<InMemoryStore>,
    embedder: TableEmbedder,
    decider: Option<&Arc<ScriptedDecider>>,
    config: PipelineConfig,
) -> DedupePipeline {
    let decider = decider.map(|d| d.clone() as Arc<dyn Decider>);
    DedupePipeline::new(store.clone(), Arc::new(embedder), decider, config)
        .expect("pipeline wiring")
}
