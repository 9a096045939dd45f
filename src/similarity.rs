//! Sparse-vector cosine similarity and deterministic top-K neighbor lookup.

use std::collections::HashMap;

use crate::cooccur::CoOccurrenceIndex;

/// A term similar to some query term, with its cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarTerm {
    /// The neighbor term.
    pub term: String,
    /// Cosine similarity in [0, 1].
    pub similarity: f32,
}

/// Cosine similarity between two sparse count vectors.
///
/// Returns 0 when either vector has zero magnitude. Counts are
/// non-negative, so the result is always within [0, 1].
pub fn cosine(a: &HashMap<String, u32>, b: &HashMap<String, u32>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // Iterate the smaller map for the dot product.
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let mut dot = 0.0f64;
    for (term, &count) in small {
        if let Some(&other) = large.get(term) {
            dot += count as f64 * other as f64;
        }
    }
    if dot == 0.0 {
        return 0.0;
    }

    let mag_a: f64 = a.values().map(|&c| (c as f64) * (c as f64)).sum::<f64>().sqrt();
    let mag_b: f64 = b.values().map(|&c| (c as f64) * (c as f64)).sum::<f64>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    ((dot / (mag_a * mag_b)) as f32).clamp(0.0, 1.0)
}

/// Find the top-K terms most similar to `term` within one document's index.
///
/// Candidates below `min_similarity` are excluded. Ordering is descending
/// similarity with lexicographic term order as tiebreak, so results are
/// deterministic for a given index.
pub fn find_similar_terms(
    term: &str,
    index: &CoOccurrenceIndex,
    top_k: usize,
    min_similarity: f32,
) -> Vec<SimilarTerm> {
    let Some(row) = index.row(term) else {
        return Vec::new();
    };
    if top_k == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<SimilarTerm> = index
        .matrix
        .iter()
        .filter(|(candidate, _)| candidate.as_str() != term)
        .map(|(candidate, candidate_row)| SimilarTerm {
            term: candidate.clone(),
            similarity: cosine(row, candidate_row),
        })
        .filter(|candidate| candidate.similarity >= min_similarity)
        .collect();

    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.term.cmp(&b.term))
    });
    candidates.truncate(top_k);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooccur::{build_index, IndexConfig};

    fn vector(pairs: &[(&str, u32)]) -> HashMap<String, u32> {
        pairs.iter().map(|(t, c)| (t.to_string(), *c)).collect()
    }

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vector(&[("fuel", 3), ("pump", 2)]);
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let a = vector(&[("fuel", 3)]);
        let b = vector(&[("goggles", 5)]);
        assert_eq!(cosine(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_zero_magnitude() {
        let a = vector(&[]);
        let b = vector(&[("fuel", 1)]);
        assert_eq!(cosine(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_within_bounds() {
        let a = vector(&[("fuel", 7), ("pump", 1), ("line", 4)]);
        let b = vector(&[("fuel", 2), ("line", 9)]);
        let sim = cosine(&a, &b);
        assert!((0.0..=1.0).contains(&sim));
    }

    #[test]
    fn test_cosine_symmetric() {
        let a = vector(&[("fuel", 7), ("pump", 1)]);
        let b = vector(&[("fuel", 2), ("line", 9)]);
        assert_eq!(cosine(&a, &b), cosine(&b, &a));
    }

    fn test_index() -> CoOccurrenceIndex {
        let config = IndexConfig {
            window_size: 4,
            min_frequency: 2,
            ..IndexConfig::default()
        };
        build_index(
            "fuel pump filter. fuel pump filter. fuel pump filter. fuel pump filter.",
            &config,
        )
    }

    #[test]
    fn test_find_similar_excludes_self() {
        let index = test_index();
        let similar = find_similar_terms("fuel", &index, 10, 0.0);
        assert!(similar.iter().all(|s| s.term != "fuel"));
        assert!(!similar.is_empty());
    }

    #[test]
    fn test_find_similar_descending_order() {
        let index = test_index();
        let similar = find_similar_terms("fuel", &index, 10, 0.0);
        for pair in similar.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[test]
    fn test_find_similar_respects_top_k() {
        let index = test_index();
        let similar = find_similar_terms("fuel", &index, 1, 0.0);
        assert!(similar.len() <= 1);
    }

    #[test]
    fn test_find_similar_min_similarity_floor() {
        let index = test_index();
        let similar = find_similar_terms("fuel", &index, 10, 0.99);
        for s in &similar {
            assert!(s.similarity >= 0.99);
        }
    }

    #[test]
    fn test_find_similar_unknown_term() {
        let index = test_index();
        assert!(find_similar_terms("nonexistent", &index, 5, 0.0).is_empty());
    }

    #[test]
    fn test_find_similar_deterministic() {
        let index = test_index();
        let a = find_similar_terms("pump", &index, 5, 0.0);
        let b = find_similar_terms("pump", &index, 5, 0.0);
        assert_eq!(a, b);
    }
}
