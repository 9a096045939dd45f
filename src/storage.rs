//! Storage collaborator abstraction for documents, chunks, and indices.
//!
//! The query path is read-only; `put_vectors` belongs to ingestion. Stores
//! are external collaborators: the engine never mutates what they return.

use async_trait::async_trait;
use thiserror::Error;

use crate::cooccur::CoOccurrenceIndex;
use crate::types::{Chunk, CollectionId, DocId, DocumentInfo};

/// Storage-related errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object not found in storage.
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O error during storage operation.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Error from the underlying storage backend.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Abstraction over chunk/index stores (in-memory, local filesystem, ...).
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// All chunks of a document, in chronological order.
    async fn chunks_by_document(&self, doc_id: DocId) -> StorageResult<Vec<Chunk>>;

    /// All chunks of every document in a collection. Order is unspecified;
    /// callers sort as needed.
    async fn chunks_by_collection(&self, collection_id: CollectionId)
        -> StorageResult<Vec<Chunk>>;

    /// Document metadata.
    async fn document(&self, doc_id: DocId) -> StorageResult<DocumentInfo>;

    /// The document's stored co-occurrence index, or `None` when absent.
    /// A missing index is not an error: queries degrade gracefully.
    async fn vectors(&self, doc_id: DocId) -> StorageResult<Option<CoOccurrenceIndex>>;

    /// Persist a document's co-occurrence index (ingestion write path).
    async fn put_vectors(&self, doc_id: DocId, index: &CoOccurrenceIndex) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::NotFound("document 3".to_string());
        assert!(err.to_string().contains("document 3"));

        let err = StorageError::Io("disk full".to_string());
        assert!(err.to_string().contains("disk full"));

        let err = StorageError::Backend("permission denied".to_string());
        assert!(err.to_string().contains("permission denied"));
    }
}
