//! Core types for the corpuslens engine.

use rkyv::{Archive, Deserialize, Serialize};

/// Document identifier type.
pub type DocId = u32;

/// Collection identifier type.
pub type CollectionId = u32;

/// Topic identifier type (unique within a single query).
pub type TopicId = u32;

/// Document metadata as seen by the query path.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DocumentInfo {
    /// Unique document identifier.
    pub id: DocId,
    /// Display name shown in rendered output.
    pub name: String,
}

/// A contiguous text slice of a document, produced by an external chunker.
///
/// Chunks within a document are totally ordered by `chunk_number` with no
/// gaps. The core never re-chunks.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    /// Chunk identifier assigned at ingest.
    pub id: u64,
    /// Parent document identifier.
    pub doc_id: DocId,
    /// Zero-based position within the parent document.
    pub chunk_number: u32,
    /// Raw text content.
    pub content: String,
    /// Content length in bytes.
    pub char_count: u32,
}

impl Chunk {
    /// Create a chunk, deriving `char_count` from the content.
    pub fn new(id: u64, doc_id: DocId, chunk_number: u32, content: impl Into<String>) -> Self {
        let content = content.into();
        let char_count = content.len() as u32;
        Self {
            id,
            doc_id,
            chunk_number,
            content,
            char_count,
        }
    }

    /// Chronological ordering key: ascending (document, position).
    pub fn chrono_key(&self) -> (DocId, u32) {
        (self.doc_id, self.chunk_number)
    }
}

/// Per-chunk score components produced by the scorer.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ScoreBreakdown {
    /// Weight contributed by literal query terms.
    pub original_term_score: f32,
    /// Weight contributed by expansion terms, scaled by similarity.
    pub semantic_score: f32,
    /// Bonus for matched terms occurring close together.
    pub proximity_score: f32,
    /// Every concept term found in the chunk, sorted.
    pub matched_terms: Vec<String>,
    /// The subset of matched terms that were literal query terms.
    pub matched_original_terms: Vec<String>,
    /// Number of distinct matched terms.
    pub match_count: u32,
}

/// A chunk augmented with its relevance score for one topic.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScoredChunk {
    /// The underlying chunk.
    pub chunk: Chunk,
    /// Total relevance score (sum of the breakdown components).
    pub relevance_score: f32,
    /// Score components.
    pub breakdown: ScoreBreakdown,
}

/// One topic's slice of a super chunk.
///
/// Chunks appear in chronological order; ranking decided selection,
/// chronology decides presentation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TopicSection {
    /// Topic identifier from the query.
    pub topic_id: TopicId,
    /// The topic's question text.
    pub topic_question: String,
    /// Chunks in ascending (doc_id, chunk_number) order.
    pub chunks: Vec<ScoredChunk>,
    /// True when this topic already emitted chunks in an earlier super chunk.
    pub is_continuation: bool,
}

impl TopicSection {
    /// Open an empty section for a topic.
    pub fn new(
        topic_id: TopicId,
        topic_question: impl Into<String>,
        is_continuation: bool,
    ) -> Self {
        Self {
            topic_id,
            topic_question: topic_question.into(),
            chunks: Vec::new(),
            is_continuation,
        }
    }
}

/// A size-bounded bundle of topic sections constituting one paste unit.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SuperChunk {
    /// Topic sections in input topic order.
    pub topics: Vec<TopicSection>,
    /// Accounted serialized size in bytes (upper bound on the rendered size).
    pub total_chars: u32,
    /// True for the super chunk that carries the package header.
    pub is_first: bool,
}

impl SuperChunk {
    /// Total number of chunks across all sections.
    pub fn chunk_count(&self) -> usize {
        self.topics.iter().map(|t| t.chunks.len()).sum()
    }

    /// Topic of the first section, used for per-topic limit enforcement.
    pub fn primary_topic(&self) -> Option<TopicId> {
        self.topics.first().map(|t| t.topic_id)
    }
}

// ============================================================================
// Stored (archived) records
// ============================================================================

/// Document metadata as persisted by a store.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct StoredDocumentInfo {
    /// Document ID.
    pub id: DocId,
    /// Display name.
    pub name: String,
}

impl StoredDocumentInfo {
    /// Create from a DocumentInfo.
    pub fn from_info(info: &DocumentInfo) -> Self {
        Self {
            id: info.id,
            name: info.name.clone(),
        }
    }

    /// Convert back to the runtime type.
    pub fn into_info(self) -> DocumentInfo {
        DocumentInfo {
            id: self.id,
            name: self.name,
        }
    }
}

/// Chunk data as persisted by a store.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Chunk ID.
    pub id: u64,
    /// Parent document ID.
    pub doc_id: DocId,
    /// Position within the document.
    pub chunk_number: u32,
    /// Text content.
    pub content: String,
}

impl StoredChunk {
    /// Create from a Chunk.
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id,
            doc_id: chunk.doc_id,
            chunk_number: chunk.chunk_number,
            content: chunk.content.clone(),
        }
    }

    /// Convert back to the runtime type.
    pub fn into_chunk(self) -> Chunk {
        Chunk::new(self.id, self.doc_id, self.chunk_number, self.content)
    }
}
