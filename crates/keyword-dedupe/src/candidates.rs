//! Similarity candidate generation.
//!
//! Scores every unordered keyword pair, keeps the ones at or above the
//! threshold, then caps per-keyword fan-out greedily: pairs are visited in
//! descending score order and kept only while neither endpoint has reached
//! `max_neighbors` accepted pairs. This is a greedy approximation of a
//! b-matching, not an optimal one; it favors each keyword's strongest links
//! and yields a sparse, high-precision candidate graph.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use keyword_types::{Keyword, KeywordId, SimilarityMode};

use crate::similarity::pair_score;

/// Undirected candidate edge between two keywords, `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityPair {
    pub a: KeywordId,
    pub b: KeywordId,
    pub score: f32,
}

impl SimilarityPair {
    /// Build a pair with endpoints in ascending order.
    pub fn new(x: KeywordId, y: KeywordId, score: f32) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Self { a, b, score }
    }

    pub fn touches(&self, id: KeywordId) -> bool {
        self.a == id || self.b == id
    }
}

/// Descending score, then ascending endpoints. Sorting with this puts the
/// best pair first.
fn by_rank(x: &SimilarityPair, y: &SimilarityPair) -> Ordering {
    y.score
        .total_cmp(&x.score)
        .then_with(|| (x.a, x.b).cmp(&(y.a, y.b)))
}

/// Heap entry ordered by [`by_rank`]; the heap maximum is the worst pair.
struct Ranked(SimilarityPair);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        by_rank(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        by_rank(&self.0, &other.0)
    }
}

/// Candidate generation parameters.
#[derive(Debug, Clone)]
pub struct CandidateConfig {
    /// Minimum score for a pair to qualify; clamped to [0, 1]
    pub threshold: f32,
    /// Maximum accepted pairs per keyword
    pub max_neighbors: usize,
    /// Scoring mode
    pub mode: SimilarityMode,
    /// Size of the diagnostic top-pairs list
    pub top_k: usize,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        let mode = SimilarityMode::default();
        Self {
            threshold: mode.default_threshold(),
            max_neighbors: 30,
            mode,
            top_k: 20,
        }
    }
}

/// Output of [`build_candidates`].
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    /// Accepted pairs, best first
    pub pairs: Vec<SimilarityPair>,
    /// Best `top_k` scored pairs regardless of threshold, best first
    pub top_pairs: Vec<SimilarityPair>,
    /// Number of pairs scored
    pub compared: usize,
    /// Pairs at or above threshold before capping
    pub qualifying: usize,
}

/// Score all keyword pairs and return the capped candidate set.
pub fn build_candidates(keywords: &[Keyword], config: &CandidateConfig) -> CandidateSet {
    let threshold = config.threshold.clamp(0.0, 1.0);

    let mut sorted: Vec<&Keyword> = keywords.iter().collect();
    sorted.sort_by_key(|k| k.id);

    let mut qualifying = Vec::new();
    let mut top: BinaryHeap<Ranked> = BinaryHeap::with_capacity(config.top_k + 1);
    let mut compared = 0usize;

    for (i, a) in sorted.iter().enumerate() {
        for b in &sorted[i + 1..] {
            if a.id == b.id {
                continue;
            }
            let Some(score) = pair_score(a, b, config.mode) else {
                continue;
            };
            compared += 1;
            let pair = SimilarityPair::new(a.id, b.id, score);

            if config.top_k > 0 {
                top.push(Ranked(pair));
                if top.len() > config.top_k {
                    top.pop();
                }
            }
            if score >= threshold {
                qualifying.push(pair);
            }
        }
    }

    qualifying.sort_by(by_rank);
    let qualifying_count = qualifying.len();

    let mut degree: HashMap<KeywordId, usize> = HashMap::new();
    let mut pairs = Vec::new();
    for pair in qualifying {
        let da = degree.get(&pair.a).copied().unwrap_or(0);
        let db = degree.get(&pair.b).copied().unwrap_or(0);
        if da >= config.max_neighbors || db >= config.max_neighbors {
            continue;
        }
        *degree.entry(pair.a).or_insert(0) += 1;
        *degree.entry(pair.b).or_insert(0) += 1;
        pairs.push(pair);
    }

    debug!(
        compared,
        qualifying = qualifying_count,
        accepted = pairs.len(),
        threshold,
        "Built similarity candidates"
    );

    let top_pairs = top.into_sorted_vec().into_iter().map(|r| r.0).collect();

    CandidateSet {
        pairs,
        top_pairs,
        compared,
        qualifying: qualifying_count,
    }
}
