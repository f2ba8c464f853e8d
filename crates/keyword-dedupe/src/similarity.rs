//! Vector similarity functions.

use keyword_types::{Keyword, SimilarityMode};

/// Calculate cosine similarity between two vectors.
///
/// Returns a value in [-1.0, 1.0]. A zero-norm vector, mismatched
/// dimensions, or a non-finite result all yield 0.0, never NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let sim = dot_product / (norm_a * norm_b);
    if sim.is_finite() {
        sim.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Similarity score of two keywords under `mode`.
///
/// `Combined` takes the max of text and name similarity when both sides
/// have a text embedding, so a pair matching either semantically or
/// lexically scores high. Otherwise only names are compared. Returns
/// `None` when either side lacks a name embedding.
pub fn pair_score(a: &Keyword, b: &Keyword, mode: SimilarityMode) -> Option<f32> {
    let name_a = a.name_embedding.as_deref().filter(|v| !v.is_empty())?;
    let name_b = b.name_embedding.as_deref().filter(|v| !v.is_empty())?;
    let name_sim = cosine_similarity(name_a, name_b);

    if mode == SimilarityMode::NameOnly {
        return Some(name_sim);
    }

    match (a.text_embedding.as_deref(), b.text_embedding.as_deref()) {
        (Some(ta), Some(tb)) if !ta.is_empty() && !tb.is_empty() => {
            Some(cosine_similarity(ta, tb).max(name_sim))
        }
        _ => Some(name_sim),
    }
}
