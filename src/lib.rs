//! corpuslens - a Rust library for client-side corpus reduction.
//!
//! Given a user's documents (pre-chunked by an external chunker) and one or
//! more natural-language topics, corpuslens selects the passages most
//! relevant to those topics and packs them into fixed-size text bundles
//! ("super chunks") ready to paste into an external chat model. Everything
//! runs on-device; documents never leave the process.
//!
//! The retrieval pipeline:
//! - **Co-occurrence indexing**: each document's token stream (unigrams,
//!   bigrams, trigrams) feeds a windowed term co-occurrence matrix that is
//!   persisted per document.
//! - **Query expansion**: topic terms grow with their most similar
//!   neighbors via sparse-vector cosine over the per-document matrices.
//! - **Hybrid scoring**: chunks are scored on original-term,
//!   semantic-expansion, and proximity signals, then filtered and ranked.
//! - **Packing**: ranked chunks are grouped by topic, re-ordered
//!   chronologically, and packed into size-bounded super chunks with a
//!   deterministic envelope format.
//!
//! Storage is an external collaborator behind the [`ChunkStore`] trait;
//! [`MemoryStore`] and the object_store-backed [`object_store::ObjectStoreBackend`]
//! ship with the crate.

pub mod cooccur;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod expand;
pub mod memory;
pub mod object_store;
pub mod packer;
pub mod query;
pub mod score;
pub mod similarity;
pub mod spatial;
pub mod storage;
pub mod tokenizer;
pub mod types;

// Re-export commonly used types
pub use cooccur::{build_index, CoOccurrenceIndex, IndexConfig};
pub use engine::{
    CancelToken, Clock, Engine, EngineConfig, Phase, QueryContext, QueryOutcome, SystemClock,
    TopicResult,
};
pub use envelope::RenderedSuperChunk;
pub use error::{Error, QueryError, Result};
pub use expand::{expand_query_multi_doc, expand_topic, ExpandedConcept, TermInfo};
pub use memory::MemoryStore;
pub use packer::{OversizePolicy, PackerConfig, RankedTopic};
pub use query::{AccountTier, QuerySpec, SourceSelector, TopicSpec};
pub use score::{score_chunk, ScoringConfig};
pub use similarity::{cosine, find_similar_terms, SimilarTerm};
pub use spatial::{SpatialConfig, SpatialMode, SpatialPattern};
pub use storage::{ChunkStore, StorageError, StorageResult};
pub use types::{
    Chunk, CollectionId, DocId, DocumentInfo, ScoreBreakdown, ScoredChunk, SuperChunk, TopicId,
    TopicSection,
};

// Re-export convenience functions
pub use object_store::local;
