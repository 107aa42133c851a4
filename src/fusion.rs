//! Keyword/semantic score fusion.
//!
//! Keyword scores are normalized by the batch maximum so the top keyword
//! hit is exactly 1.0 (an epsilon divisor guards all-zero batches).
//! Semantic scores are already bounded and are used unnormalized, clamped
//! non-negative. Every document id found in either set gets
//! `hybrid = kw_norm * kw_weight + sem * sem_weight`, with 0 for a
//! missing component; for weights summing to 1 the result lies in [0,1].

use std::collections::BTreeMap;

const EPSILON: f64 = 1e-9;

pub const DEFAULT_KEYWORD_WEIGHT: f64 = 0.3;
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.7;

/// One side's candidate for fusion, keyed by document id.
#[derive(Debug, Clone)]
pub struct FusionCandidate {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct FusedResult {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub score: f64,
    pub keyword_component: f64,
    pub semantic_component: f64,
}

pub fn fuse(
    keyword: &[FusionCandidate],
    semantic: &[FusionCandidate],
    keyword_weight: f64,
    semantic_weight: f64,
) -> Vec<FusedResult> {
    let max_keyword = keyword
        .iter()
        .map(|c| c.score)
        .fold(0.0f64, f64::max)
        .max(EPSILON);

    // BTreeMap keeps the id union deterministic.
    let mut by_id: BTreeMap<&str, (Option<&FusionCandidate>, Option<&FusionCandidate>)> =
        BTreeMap::new();
    for cand in keyword {
        by_id.entry(cand.id.as_str()).or_default().0 = Some(cand);
    }
    for cand in semantic {
        by_id.entry(cand.id.as_str()).or_default().1 = Some(cand);
    }

    let mut fused: Vec<FusedResult> = by_id
        .into_values()
        .filter_map(|(kw, sem)| {
            let keyword_component = kw.map(|c| c.score / max_keyword).unwrap_or(0.0);
            let semantic_component = sem.map(|c| c.score.max(0.0)).unwrap_or(0.0);
            // Prefer the semantic excerpt; it is an actual passage rather
            // than a window around a term hit.
            let exemplar = sem.or(kw)?;

            Some(FusedResult {
                id: exemplar.id.clone(),
                title: exemplar.title.clone(),
                excerpt: exemplar.excerpt.clone(),
                score: keyword_component * keyword_weight + semantic_component * semantic_weight,
                keyword_component,
                semantic_component,
            })
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(id: &str, score: f64) -> FusionCandidate {
        FusionCandidate {
            id: id.to_string(),
            title: id.to_string(),
            excerpt: format!("excerpt for {}", id),
            score,
        }
    }

    #[test]
    fn test_top_keyword_normalizes_to_one() {
        let kw = vec![cand("a", 4.0), cand("b", 2.0)];
        let fused = fuse(&kw, &[], 1.0, 0.0);
        assert!((fused[0].score - 1.0).abs() < 1e-9);
        assert_eq!(fused[0].id, "a");
        assert!((fused[1].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_component_contributes_zero() {
        let kw = vec![cand("only-kw", 3.0)];
        let sem = vec![cand("only-sem", 0.8)];
        let fused = fuse(&kw, &sem, 0.3, 0.7);

        let kw_result = fused.iter().find(|f| f.id == "only-kw").unwrap();
        assert!((kw_result.score - 0.3).abs() < 1e-9);
        assert_eq!(kw_result.semantic_component, 0.0);

        let sem_result = fused.iter().find(|f| f.id == "only-sem").unwrap();
        assert!((sem_result.score - 0.56).abs() < 1e-9);
        assert_eq!(sem_result.keyword_component, 0.0);
    }

    #[test]
    fn test_hybrid_bounds() {
        let kw = vec![cand("a", 12.0), cand("b", 0.0), cand("c", 3.3)];
        let sem = vec![cand("a", 0.99), cand("d", 0.01), cand("e", -0.4)];
        for (kw_w, sem_w) in [(0.3, 0.7), (0.5, 0.5), (1.0, 0.0), (0.0, 1.0)] {
            for result in fuse(&kw, &sem, kw_w, sem_w) {
                assert!(
                    (0.0..=1.0 + 1e-9).contains(&result.score),
                    "score {} out of [0,1] for weights {}/{}",
                    result.score,
                    kw_w,
                    sem_w
                );
            }
        }
    }

    #[test]
    fn test_all_zero_keyword_batch() {
        let kw = vec![cand("a", 0.0), cand("b", 0.0)];
        let fused = fuse(&kw, &[], 0.3, 0.7);
        for result in &fused {
            assert!(result.score.is_finite());
            assert_eq!(result.score, 0.0);
        }
    }

    #[test]
    fn test_semantic_clamped_non_negative() {
        let sem = vec![cand("opposite", -0.9)];
        let fused = fuse(&[], &sem, 0.3, 0.7);
        assert_eq!(fused[0].score, 0.0);
    }

    #[test]
    fn test_both_components_combine() {
        let kw = vec![cand("shared", 5.0)];
        let sem = vec![cand("shared", 0.5)];
        let fused = fuse(&kw, &sem, 0.3, 0.7);
        assert_eq!(fused.len(), 1);
        // 1.0 * 0.3 + 0.5 * 0.7
        assert!((fused[0].score - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_semantic_excerpt_preferred() {
        let kw = vec![cand("shared", 5.0)];
        let mut sem = vec![cand("shared", 0.5)];
        sem[0].excerpt = "the actual passage".to_string();
        let fused = fuse(&kw, &sem, 0.3, 0.7);
        assert_eq!(fused[0].excerpt, "the actual passage");
    }
}
