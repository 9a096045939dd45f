//! object_store-backed chunk store: documents, chunks, and indices
//! persisted as rkyv blobs on the local filesystem.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{local::LocalFileSystem, ObjectStore};
use rkyv::rancor::Error as RkyvError;
use std::path::Path;
use std::sync::Arc;

use crate::cooccur::{CoOccurrenceIndex, StoredIndex};
use crate::storage::{ChunkStore, StorageError, StorageResult};
use crate::types::{Chunk, CollectionId, DocId, DocumentInfo, StoredChunk, StoredDocumentInfo};

/// Prefix for document metadata records.
const DOCUMENTS_PREFIX: &str = "documents";

/// Prefix for per-document chunk lists.
const CHUNKS_PREFIX: &str = "chunks";

/// Prefix for stored co-occurrence indices.
const VECTORS_PREFIX: &str = "vectors";

/// Prefix for collection membership lists.
const COLLECTIONS_PREFIX: &str = "collections";

/// Every record kind the store lays out under its root.
const RECORD_PREFIXES: &[&str] = &[
    DOCUMENTS_PREFIX,
    CHUNKS_PREFIX,
    VECTORS_PREFIX,
    COLLECTIONS_PREFIX,
];

/// ChunkStore implementation backed by the object_store crate.
///
/// Records live under one prefix per kind (`documents/`, `chunks/`,
/// `vectors/`, `collections/`), one rkyv blob per id, so deleting a
/// document is three point deletes and never a scan.
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBackend {
    /// Wrap an existing object_store implementation. The backend only
    /// addresses paths under the per-kind record prefixes.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Open (or initialize) a store rooted at a local directory. The root
    /// and one subdirectory per record kind are created up front so a
    /// fresh store is queryable before anything is ingested.
    pub fn local(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref();
        for prefix in RECORD_PREFIXES {
            std::fs::create_dir_all(root.join(prefix)).map_err(|e| {
                StorageError::Io(format!(
                    "cannot create {prefix}/ under {}: {e}",
                    root.display()
                ))
            })?;
        }

        let fs = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self::new(Arc::new(fs)))
    }

    async fn get(&self, path: &str) -> StorageResult<Bytes> {
        let location = object_store::path::Path::from(path);
        let result = self.store.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(path.to_string()),
            _ => StorageError::Backend(e.to_string()),
        })?;
        result
            .bytes()
            .await
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> StorageResult<()> {
        let location = object_store::path::Path::from(path);
        let payload = object_store::PutPayload::from_bytes(Bytes::from(data));
        self.store
            .put(&location, payload)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let location = object_store::path::Path::from(path);
        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    /// Persist a document and its chunks (ingestion write path).
    pub async fn add_document(&self, info: &DocumentInfo, chunks: &[Chunk]) -> StorageResult<()> {
        let stored_info = StoredDocumentInfo::from_info(info);
        self.put(&document_path(info.id), serialize_document_info(&stored_info)?)
            .await?;

        let mut stored_chunks: Vec<StoredChunk> =
            chunks.iter().map(StoredChunk::from_chunk).collect();
        stored_chunks.sort_by_key(|c| c.chunk_number);
        self.put(&chunks_path(info.id), serialize_chunks(&stored_chunks)?)
            .await
    }

    /// Persist a collection's document membership, replacing any previous
    /// membership list.
    pub async fn add_collection(
        &self,
        collection_id: CollectionId,
        doc_ids: &[DocId],
    ) -> StorageResult<()> {
        let docs: Vec<DocId> = doc_ids.to_vec();
        self.put(&collection_path(collection_id), serialize_doc_ids(&docs)?)
            .await
    }

    /// Delete a document, its chunks, and its stored index.
    pub async fn remove_document(&self, doc_id: DocId) -> StorageResult<()> {
        self.delete(&document_path(doc_id)).await?;
        self.delete(&chunks_path(doc_id)).await?;
        self.delete(&vectors_path(doc_id)).await
    }
}

#[async_trait]
impl ChunkStore for ObjectStoreBackend {
    async fn chunks_by_document(&self, doc_id: DocId) -> StorageResult<Vec<Chunk>> {
        match self.get(&chunks_path(doc_id)).await {
            Ok(bytes) => {
                let stored = deserialize_chunks(&bytes)?;
                Ok(stored.into_iter().map(StoredChunk::into_chunk).collect())
            }
            Err(StorageError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn chunks_by_collection(
        &self,
        collection_id: CollectionId,
    ) -> StorageResult<Vec<Chunk>> {
        let bytes = self.get(&collection_path(collection_id)).await?;
        let doc_ids = deserialize_doc_ids(&bytes)?;

        let mut chunks = Vec::new();
        for doc_id in doc_ids {
            chunks.extend(self.chunks_by_document(doc_id).await?);
        }
        Ok(chunks)
    }

    async fn document(&self, doc_id: DocId) -> StorageResult<DocumentInfo> {
        let bytes = self.get(&document_path(doc_id)).await?;
        let stored = deserialize_document_info(&bytes)?;
        Ok(stored.into_info())
    }

    async fn vectors(&self, doc_id: DocId) -> StorageResult<Option<CoOccurrenceIndex>> {
        match self.get(&vectors_path(doc_id)).await {
            Ok(bytes) => {
                let stored = deserialize_index(&bytes)?;
                Ok(Some(stored.into_index()))
            }
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put_vectors(&self, doc_id: DocId, index: &CoOccurrenceIndex) -> StorageResult<()> {
        let stored = StoredIndex::from_index(index);
        self.put(&vectors_path(doc_id), serialize_index(&stored)?)
            .await
    }
}

fn document_path(doc_id: DocId) -> String {
    format!("{DOCUMENTS_PREFIX}/{doc_id}.bin")
}

fn chunks_path(doc_id: DocId) -> String {
    format!("{CHUNKS_PREFIX}/{doc_id}.bin")
}

fn vectors_path(doc_id: DocId) -> String {
    format!("{VECTORS_PREFIX}/{doc_id}.bin")
}

fn collection_path(collection_id: CollectionId) -> String {
    format!("{COLLECTIONS_PREFIX}/{collection_id}.bin")
}

// Serialization helpers using the rkyv 0.8 API, one per stored type.

fn io_error(e: impl std::fmt::Display, what: &str) -> StorageError {
    StorageError::Io(format!("{what} error: {e}"))
}

fn serialize_document_info(value: &StoredDocumentInfo) -> StorageResult<Vec<u8>> {
    rkyv::to_bytes::<RkyvError>(value)
        .map(|b| b.to_vec())
        .map_err(|e| io_error(e, "document serialization"))
}

fn deserialize_document_info(bytes: &[u8]) -> StorageResult<StoredDocumentInfo> {
    rkyv::from_bytes::<StoredDocumentInfo, RkyvError>(bytes)
        .map_err(|e| io_error(e, "document deserialization"))
}

fn serialize_chunks(value: &Vec<StoredChunk>) -> StorageResult<Vec<u8>> {
    rkyv::to_bytes::<RkyvError>(value)
        .map(|b| b.to_vec())
        .map_err(|e| io_error(e, "chunk serialization"))
}

fn deserialize_chunks(bytes: &[u8]) -> StorageResult<Vec<StoredChunk>> {
    rkyv::from_bytes::<Vec<StoredChunk>, RkyvError>(bytes)
        .map_err(|e| io_error(e, "chunk deserialization"))
}

fn serialize_index(value: &StoredIndex) -> StorageResult<Vec<u8>> {
    rkyv::to_bytes::<RkyvError>(value)
        .map(|b| b.to_vec())
        .map_err(|e| io_error(e, "index serialization"))
}

fn deserialize_index(bytes: &[u8]) -> StorageResult<StoredIndex> {
    rkyv::from_bytes::<StoredIndex, RkyvError>(bytes)
        .map_err(|e| io_error(e, "index deserialization"))
}

fn serialize_doc_ids(value: &Vec<DocId>) -> StorageResult<Vec<u8>> {
    rkyv::to_bytes::<RkyvError>(value)
        .map(|b| b.to_vec())
        .map_err(|e| io_error(e, "collection serialization"))
}

fn deserialize_doc_ids(bytes: &[u8]) -> StorageResult<Vec<DocId>> {
    rkyv::from_bytes::<Vec<DocId>, RkyvError>(bytes)
        .map_err(|e| io_error(e, "collection deserialization"))
}

/// Open a local filesystem store rooted at `root`.
pub fn local(root: impl AsRef<Path>) -> StorageResult<ObjectStoreBackend> {
    ObjectStoreBackend::local(root)
}
