//! Error types for the corpuslens library.

use thiserror::Error;

use crate::types::{DocId, TopicId};

/// Top-level error type for corpuslens operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid query input, detected before any work starts.
    #[error("invalid query: {0}")]
    Query(#[from] QueryError),

    /// Storage collaborator failure; no partial result is produced.
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// A single chunk's envelope exceeds the super-chunk size limit and the
    /// fail-fast oversize policy is active.
    #[error(
        "chunk {chunk_number} of document {doc_id} needs {needed} bytes, limit is {limit}"
    )]
    OversizedChunk {
        /// Owning document.
        doc_id: DocId,
        /// Position within the document.
        chunk_number: u32,
        /// Bytes the chunk's envelope requires.
        needed: u32,
        /// Configured super-chunk size limit.
        limit: u32,
    },

    /// The query was cancelled cooperatively; no partial result is produced.
    #[error("query cancelled")]
    Cancelled,
}

/// Input-validation failures, surfaced to the caller before any work.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The query carries no topics.
    #[error("no topics in query")]
    NoTopics,

    /// A topic's question is empty or whitespace.
    #[error("topic {0} has an empty question")]
    EmptyQuestion(TopicId),

    /// No documents were selected.
    #[error("no documents selected")]
    NoDocuments,

    /// Unrecognized account tier name.
    #[error("unknown tier: {0}")]
    UnknownTier(String),

    /// Per-topic super-chunk limit outside the accepted 1..=10 range.
    #[error("max super chunks per topic must be 1..=10, got {0}")]
    InvalidLimit(u32),
}

/// Result type for corpuslens operations.
pub type Result<T> = std::result::Result<T, Error>;
