//! Query expansion: grow a topic's term set with similar neighbors from the
//! per-document co-occurrence indices.

use std::collections::HashMap;

use crate::cooccur::{CoOccurrenceIndex, IndexConfig};
use crate::similarity::find_similar_terms;
use crate::tokenizer::query_terms;
use crate::types::DocId;

/// Similarity metadata carried by every expanded term.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TermInfo {
    /// Maximum similarity observed across the queried documents.
    /// Original query terms carry 1.0.
    pub similarity: f32,
    /// True when the term appears literally in the user's question.
    pub is_original: bool,
}

/// A topic's expanded term set, merged across all queried documents.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExpandedConcept {
    /// The raw user question.
    pub original_question: String,
    /// Terms literally present in the question, sorted.
    pub original_terms: Vec<String>,
    /// Union of original terms and their neighbors, sorted.
    pub terms: Vec<String>,
    /// Metadata for every term in `terms`.
    pub term_metadata: HashMap<String, TermInfo>,
}

impl ExpandedConcept {
    /// Metadata for a term, if present.
    pub fn info(&self, term: &str) -> Option<&TermInfo> {
        self.term_metadata.get(term)
    }
}

/// Expand one query term over a set of documents.
///
/// The term contributes itself with similarity 1.0. For each document
/// whose index contains the term, its top-K neighbors join the set; when
/// the same neighbor surfaces from several documents the maximum
/// similarity wins. Documents without an index contribute only the term
/// itself (graceful degradation, not an error).
fn expand_term(
    term: &str,
    indices: &[(DocId, Option<&CoOccurrenceIndex>)],
    config: &IndexConfig,
    metadata: &mut HashMap<String, TermInfo>,
) {
    metadata.insert(
        term.to_string(),
        TermInfo {
            similarity: 1.0,
            is_original: true,
        },
    );

    for (doc_id, index) in indices {
        let Some(index) = index else {
            tracing::debug!(doc_id, "no stored index; expansion uses original terms only");
            continue;
        };
        if index.row(term).is_none() {
            continue;
        }
        for neighbor in find_similar_terms(term, index, config.max_expansions, config.min_similarity)
        {
            metadata
                .entry(neighbor.term)
                .and_modify(|info| {
                    if !info.is_original && neighbor.similarity > info.similarity {
                        info.similarity = neighbor.similarity;
                    }
                })
                .or_insert(TermInfo {
                    similarity: neighbor.similarity,
                    is_original: false,
                });
        }
    }
}

fn build_concept(
    question: &str,
    originals: Vec<String>,
    metadata: HashMap<String, TermInfo>,
) -> ExpandedConcept {
    let mut original_terms = originals;
    original_terms.sort();
    let mut terms: Vec<String> = metadata.keys().cloned().collect();
    terms.sort();

    ExpandedConcept {
        original_question: question.to_string(),
        original_terms,
        terms,
        term_metadata: metadata,
    }
}

/// Expand a question into one concept per distinct query term.
pub fn expand_query_multi_doc(
    question: &str,
    indices: &[(DocId, Option<&CoOccurrenceIndex>)],
    config: &IndexConfig,
) -> Vec<ExpandedConcept> {
    query_terms(question)
        .into_iter()
        .map(|term| {
            let mut metadata = HashMap::new();
            expand_term(&term, indices, config, &mut metadata);
            build_concept(question, vec![term], metadata)
        })
        .collect()
}

/// Expand a topic question over a set of documents, collapsing all query
/// terms into a single per-topic concept.
pub fn expand_topic(
    question: &str,
    indices: &[(DocId, Option<&CoOccurrenceIndex>)],
    config: &IndexConfig,
) -> ExpandedConcept {
    let originals = query_terms(question);

    let mut metadata: HashMap<String, TermInfo> = HashMap::new();
    for term in &originals {
        expand_term(term, indices, config, &mut metadata);
    }

    build_concept(question, originals, metadata)
}
