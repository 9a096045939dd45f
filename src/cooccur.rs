//! Co-occurrence indexing: per-document sparse term co-occurrence matrices
//! with windowed counting.

use rkyv::{Archive, Deserialize, Serialize};
use std::collections::HashMap;

use crate::tokenizer::{ngrams, tokenize};

/// Default co-occurrence window radius (positions either side of center).
const DEFAULT_WINDOW_SIZE: usize = 7;

/// Default minimum term frequency; rarer terms are dropped from the index.
const DEFAULT_MIN_FREQUENCY: u32 = 2;

/// Default cap on retained vocabulary size.
const DEFAULT_MAX_TERMS: usize = 10_000;

/// Default similarity floor for expansion candidates.
const DEFAULT_MIN_SIMILARITY: f32 = 0.3;

/// Default number of expansion terms per query term per document.
const DEFAULT_MAX_EXPANSIONS: usize = 5;

/// Indexing and expansion configuration.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Window radius: positions j with |i - j| <= window_size co-occur with i.
    pub window_size: usize,
    /// Terms with frequency below this are dropped before counting.
    pub min_frequency: u32,
    /// Vocabulary cap; when exceeded, the most frequent terms win.
    pub max_terms: usize,
    /// Similarity floor for expansion candidates.
    pub min_similarity: f32,
    /// Top-K expansion terms per query term per document.
    pub max_expansions: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            min_frequency: DEFAULT_MIN_FREQUENCY,
            max_terms: DEFAULT_MAX_TERMS,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
        }
    }
}

/// Per-document co-occurrence index.
///
/// `matrix[t][u]` counts windowed co-occurrences of `u` around center `t`.
/// Counts are near-symmetric (window truncation at sequence edges can
/// break exact equality); self-counts are never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoOccurrenceIndex {
    /// term -> neighbor term -> co-occurrence count.
    pub matrix: HashMap<String, HashMap<String, u32>>,
    /// term -> occurrence count, for every retained term.
    pub term_frequencies: HashMap<String, u32>,
    /// Number of retained term occurrences in the positional sequence.
    pub total_terms: u32,
}

impl CoOccurrenceIndex {
    /// An index with no terms (the result of indexing empty text).
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when the index holds no terms.
    pub fn is_empty(&self) -> bool {
        self.term_frequencies.is_empty()
    }

    /// The sparse co-occurrence row for a term, if indexed.
    pub fn row(&self, term: &str) -> Option<&HashMap<String, u32>> {
        self.matrix.get(term)
    }
}

/// Build a co-occurrence index from the full text of a document.
///
/// The positional sequence is unigrams first, then bigrams, then trigrams
/// (n-grams co-occur with their constituents near the seam; the ordering is
/// fixed so two builds of the same text produce equal matrices). Terms
/// below `min_frequency` are removed before counting, and the window runs
/// over indices of the filtered sequence.
pub fn build_index(text: &str, config: &IndexConfig) -> CoOccurrenceIndex {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return CoOccurrenceIndex::empty();
    }

    let mut sequence = tokens.clone();
    sequence.extend(ngrams(&tokens, 2));
    sequence.extend(ngrams(&tokens, 3));

    // Frequency pass over the combined sequence.
    let mut frequencies: HashMap<String, u32> = HashMap::new();
    for occurrence in &sequence {
        *frequencies.entry(occurrence.term.clone()).or_insert(0) += 1;
    }
    frequencies.retain(|_, count| *count >= config.min_frequency);

    // Enforce the vocabulary cap by descending frequency, term order as
    // tiebreak so the cut is deterministic.
    if frequencies.len() > config.max_terms {
        let mut ranked: Vec<(String, u32)> = frequencies.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(config.max_terms);
        frequencies = ranked.into_iter().collect();
    }

    let filtered: Vec<&str> = sequence
        .iter()
        .filter(|occurrence| frequencies.contains_key(&occurrence.term))
        .map(|occurrence| occurrence.term.as_str())
        .collect();

    let mut matrix: HashMap<String, HashMap<String, u32>> = HashMap::new();
    for i in 0..filtered.len() {
        let center = filtered[i];
        let lo = i.saturating_sub(config.window_size);
        let hi = (i + config.window_size).min(filtered.len().saturating_sub(1));
        for j in lo..=hi {
            if j == i || filtered[j] == center {
                continue;
            }
            *matrix
                .entry(center.to_string())
                .or_default()
                .entry(filtered[j].to_string())
                .or_insert(0) += 1;
        }
    }

    CoOccurrenceIndex {
        matrix,
        total_terms: filtered.len() as u32,
        term_frequencies: frequencies,
    }
}

// ============================================================================
// Stored (archived) form
// ============================================================================

/// Co-occurrence index as persisted by a store.
///
/// Mappings are flattened into term-sorted pair vectors so the archived
/// bytes are deterministic for a given index.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct StoredIndex {
    /// term -> sorted (neighbor, count) rows, sorted by term.
    pub matrix: Vec<(String, Vec<(String, u32)>)>,
    /// Sorted (term, frequency) pairs.
    pub term_frequencies: Vec<(String, u32)>,
    /// Retained term occurrence count.
    pub total_terms: u32,
}

impl StoredIndex {
    /// Flatten a runtime index into its stored form.
    pub fn from_index(index: &CoOccurrenceIndex) -> Self {
        let mut matrix: Vec<(String, Vec<(String, u32)>)> = index
            .matrix
            .iter()
            .map(|(term, row)| {
                let mut pairs: Vec<(String, u32)> =
                    row.iter().map(|(u, c)| (u.clone(), *c)).collect();
                pairs.sort_by(|a, b| a.0.cmp(&b.0));
                (term.clone(), pairs)
            })
            .collect();
        matrix.sort_by(|a, b| a.0.cmp(&b.0));

        let mut term_frequencies: Vec<(String, u32)> = index
            .term_frequencies
            .iter()
            .map(|(t, c)| (t.clone(), *c))
            .collect();
        term_frequencies.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            matrix,
            term_frequencies,
            total_terms: index.total_terms,
        }
    }

    /// Rebuild the runtime maps.
    pub fn into_index(self) -> CoOccurrenceIndex {
        CoOccurrenceIndex {
            matrix: self
                .matrix
                .into_iter()
                .map(|(term, pairs)| (term, pairs.into_iter().collect()))
                .collect(),
            term_frequencies: self.term_frequencies.into_iter().collect(),
            total_terms: self.total_terms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> IndexConfig {
        IndexConfig {
            window_size: 3,
            min_frequency: 2,
            ..IndexConfig::default()
        }
    }

    #[test]
    fn test_empty_text_empty_index() {
        let index = build_index("", &IndexConfig::default());
        assert!(index.is_empty());
        assert_eq!(index.total_terms, 0);
    }

    #[test]
    fn test_min_frequency_filters_rare_terms() {
        // "pump" appears twice, "goggles" once
        let index = build_index("fuel pump fuel pump goggles", &small_config());
        assert!(index.term_frequencies.contains_key("pump"));
        assert!(index.term_frequencies.contains_key("fuel"));
        assert!(!index.term_frequencies.contains_key("goggles"));
    }

    #[test]
    fn test_matrix_keys_respect_min_frequency() {
        let index = build_index("fuel pump fuel pump goggles", &small_config());
        for term in index.matrix.keys() {
            assert!(
                index.term_frequencies[term] >= 2,
                "matrix key below min frequency: {term}"
            );
        }
    }

    #[test]
    fn test_no_self_counts() {
        let index = build_index("fuel fuel fuel pump pump fuel", &small_config());
        for (term, row) in &index.matrix {
            assert!(!row.contains_key(term), "self count stored for {term}");
        }
    }

    #[test]
    fn test_counts_near_symmetric() {
        let index = build_index(
            "fuel pump line fuel pump line fuel pump line fuel pump line",
            &small_config(),
        );
        let fp = index.matrix["fuel"].get("pump").copied().unwrap_or(0);
        let pf = index.matrix["pump"].get("fuel").copied().unwrap_or(0);
        assert!(fp > 0 && pf > 0);
        // window truncation at the edges allows a small asymmetry
        assert!(fp.abs_diff(pf) <= 2, "fp={fp} pf={pf}");
    }

    #[test]
    fn test_ngrams_join_the_sequence() {
        let text = "fuel pump repair. fuel pump repair. fuel pump repair.";
        let index = build_index(text, &small_config());
        assert!(index.term_frequencies.contains_key("fuel pump"));
        assert!(index.term_frequencies.contains_key("fuel pump repair"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let text = "the fuel pump requires a clean fuel line; the fuel line feeds the pump.";
        let a = build_index(text, &IndexConfig::default());
        let b = build_index(text, &IndexConfig::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_max_terms_keeps_most_frequent() {
        let config = IndexConfig {
            window_size: 2,
            min_frequency: 1,
            max_terms: 2,
            ..IndexConfig::default()
        };
        let index = build_index("alpha alpha alpha beta beta gamma", &config);
        assert_eq!(index.term_frequencies.len(), 2);
        assert!(index.term_frequencies.contains_key("alpha"));
        assert!(index.term_frequencies.contains_key("beta"));
    }

    #[test]
    fn test_stored_roundtrip_preserves_counts() {
        let index = build_index(
            "fuel pump line fuel pump line fuel pump line",
            &small_config(),
        );
        let stored = StoredIndex::from_index(&index);
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&stored).unwrap();
        let decoded: StoredIndex =
            rkyv::from_bytes::<StoredIndex, rkyv::rancor::Error>(&bytes).unwrap();
        assert_eq!(decoded.into_index(), index);
    }
}
