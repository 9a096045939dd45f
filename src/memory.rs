//! In-memory chunk store, used by tests and small ingest-and-query runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::cooccur::CoOccurrenceIndex;
use crate::storage::{ChunkStore, StorageError, StorageResult};
use crate::types::{Chunk, CollectionId, DocId, DocumentInfo};

#[derive(Default)]
struct Inner {
    documents: HashMap<DocId, DocumentInfo>,
    chunks: HashMap<DocId, Vec<Chunk>>,
    collections: HashMap<CollectionId, Vec<DocId>>,
    vectors: HashMap<DocId, CoOccurrenceIndex>,
}

/// An in-memory [`ChunkStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document with its chunks. Chunks are kept in chronological
    /// order regardless of insertion order.
    pub fn add_document(&self, info: DocumentInfo, mut chunks: Vec<Chunk>) {
        chunks.sort_by_key(|c| c.chunk_number);
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.chunks.insert(info.id, chunks);
        inner.documents.insert(info.id, info);
    }

    /// Add a document to a collection.
    pub fn add_to_collection(&self, collection_id: CollectionId, doc_id: DocId) {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.collections.entry(collection_id).or_default().push(doc_id);
    }

    /// Remove a document along with its chunks and stored index.
    pub fn remove_document(&self, doc_id: DocId) {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.documents.remove(&doc_id);
        inner.chunks.remove(&doc_id);
        inner.vectors.remove(&doc_id);
        for docs in inner.collections.values_mut() {
            docs.retain(|&d| d != doc_id);
        }
    }

    /// All document ids, sorted.
    pub fn document_ids(&self) -> Vec<DocId> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut ids: Vec<DocId> = inner.documents.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn chunks_by_document(&self, doc_id: DocId) -> StorageResult<Vec<Chunk>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.chunks.get(&doc_id).cloned().unwrap_or_default())
    }

    async fn chunks_by_collection(
        &self,
        collection_id: CollectionId,
    ) -> StorageResult<Vec<Chunk>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let docs = inner
            .collections
            .get(&collection_id)
            .ok_or_else(|| StorageError::NotFound(format!("collection {collection_id}")))?;
        Ok(docs
            .iter()
            .flat_map(|doc_id| inner.chunks.get(doc_id).cloned().unwrap_or_default())
            .collect())
    }

    async fn document(&self, doc_id: DocId) -> StorageResult<DocumentInfo> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner
            .documents
            .get(&doc_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("document {doc_id}")))
    }

    async fn vectors(&self, doc_id: DocId) -> StorageResult<Option<CoOccurrenceIndex>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.vectors.get(&doc_id).cloned())
    }

    async fn put_vectors(&self, doc_id: DocId, index: &CoOccurrenceIndex) -> StorageResult<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.vectors.insert(doc_id, index.clone());
        Ok(())
    }
}
