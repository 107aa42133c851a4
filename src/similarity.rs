//! Cosine similarity and top-K selection.
//!
//! Retrieval is a full linear scan over every chunk in the queried
//! collection; there is no index structure. Ties keep storage order
//! because the sort is stable and no secondary key is defined.

/// Compute cosine similarity between two vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty, mismatched-length,
/// or zero-magnitude inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Score each item against the query vector and keep the best `k`,
/// sorted descending by similarity.
pub fn top_k<T>(
    query: &[f32],
    items: Vec<(T, Vec<f32>)>,
    k: usize,
) -> Vec<(T, f64)> {
    let mut scored: Vec<(T, f64)> = items
        .into_iter()
        .map(|(item, vec)| {
            let sim = cosine_similarity(query, &vec) as f64;
            (item, sim)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}
