//! Hybrid chunk scoring: original-term, semantic-expansion, and proximity
//! signals combined into one relevance score.

use crate::expand::ExpandedConcept;
use crate::types::{Chunk, ScoreBreakdown, ScoredChunk};

/// Default weight for a matched original query term.
const DEFAULT_ORIGINAL_TERM_WEIGHT: f32 = 100.0;

/// Default weight scale for matched expansion terms.
const DEFAULT_SEMANTIC_WEIGHT: f32 = 30.0;

/// Default weight scale for the proximity bonus.
const DEFAULT_PROXIMITY_WEIGHT: f32 = 50.0;

/// Expansion terms at or above this similarity get full semantic weight;
/// below it the contribution is halved.
const DEFAULT_HIGH_SIMILARITY_THRESHOLD: f32 = 0.7;

/// Chunks scoring below this are dropped before ranking.
const DEFAULT_MINIMUM_SCORE_THRESHOLD: f32 = 30.0;

/// Maximum byte gap between matched-term occurrences that still earns a
/// proximity bonus.
const DEFAULT_PROXIMITY_DISTANCE: usize = 200;

/// Scoring configuration.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Score added per matched original term.
    pub original_term_weight: f32,
    /// Scale applied to expansion-term similarity.
    pub semantic_weight: f32,
    /// Scale applied to the proximity bonus.
    pub proximity_weight: f32,
    /// Similarity at which an expansion term earns full semantic weight.
    pub high_similarity_threshold: f32,
    /// Minimum total score a chunk must reach to be retained.
    pub minimum_score_threshold: f32,
    /// Maximum gap (bytes) between matches for the proximity bonus.
    pub proximity_distance: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            original_term_weight: DEFAULT_ORIGINAL_TERM_WEIGHT,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            proximity_weight: DEFAULT_PROXIMITY_WEIGHT,
            high_similarity_threshold: DEFAULT_HIGH_SIMILARITY_THRESHOLD,
            minimum_score_threshold: DEFAULT_MINIMUM_SCORE_THRESHOLD,
            proximity_distance: DEFAULT_PROXIMITY_DISTANCE,
        }
    }
}

/// Score one chunk against an expanded topic.
///
/// A term matches when it occurs as a substring of the lowercased chunk
/// content (phrase terms match literally across word boundaries). The
/// proximity bonus applies when at least two distinct terms match and the
/// smallest gap between adjacent match offsets is within
/// `proximity_distance`.
pub fn score_chunk(chunk: &Chunk, concept: &ExpandedConcept, config: &ScoringConfig) -> ScoredChunk {
    let content = chunk.content.to_lowercase();

    let mut breakdown = ScoreBreakdown::default();
    let mut offsets: Vec<usize> = Vec::new();

    // concept.terms is sorted, so matched term lists come out sorted too.
    for term in &concept.terms {
        if !content.contains(term.as_str()) {
            continue;
        }
        let Some(info) = concept.info(term) else {
            continue;
        };

        if info.is_original {
            breakdown.original_term_score += config.original_term_weight;
            breakdown.matched_original_terms.push(term.clone());
        } else if info.similarity >= config.high_similarity_threshold {
            breakdown.semantic_score += config.semantic_weight * info.similarity;
        } else {
            breakdown.semantic_score += config.semantic_weight * info.similarity * 0.5;
        }

        offsets.extend(content.match_indices(term.as_str()).map(|(i, _)| i));
        breakdown.matched_terms.push(term.clone());
    }

    breakdown.match_count = breakdown.matched_terms.len() as u32;

    if breakdown.match_count >= 2 {
        breakdown.proximity_score = proximity_bonus(&mut offsets, config);
    }

    let relevance_score =
        breakdown.original_term_score + breakdown.semantic_score + breakdown.proximity_score;

    ScoredChunk {
        chunk: chunk.clone(),
        relevance_score,
        breakdown,
    }
}

/// Proximity bonus from the minimum gap between adjacent match offsets.
fn proximity_bonus(offsets: &mut [usize], config: &ScoringConfig) -> f32 {
    if offsets.len() < 2 || config.proximity_distance == 0 {
        return 0.0;
    }

    offsets.sort_unstable();
    let min_gap = offsets
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .min()
        .unwrap_or(usize::MAX);

    if min_gap <= config.proximity_distance {
        config.proximity_weight * (1.0 - min_gap as f32 / config.proximity_distance as f32)
    } else {
        0.0
    }
}

/// Drop chunks below the score threshold and rank the rest.
///
/// Ranking is descending score with ascending (doc_id, chunk_number) as
/// tiebreak so equal scores order deterministically.
pub fn filter_and_rank(mut scored: Vec<ScoredChunk>, config: &ScoringConfig) -> Vec<ScoredChunk> {
    scored.retain(|s| s.relevance_score >= config.minimum_score_threshold);
    scored.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.chrono_key().cmp(&b.chunk.chrono_key()))
    });
    scored
}
