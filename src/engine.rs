//! Orchestration: run a corpus-reduction query end to end.
//!
//! The engine owns the storage collaborator and the pipeline
//! configuration. A query runs retrieve -> expand -> score -> pack ->
//! format; two runs over the same stored state produce byte-identical
//! output. Writes to the store must be quiesced for the duration of a
//! query.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cooccur::{build_index, CoOccurrenceIndex, IndexConfig};
use crate::envelope::{render_package, RenderedSuperChunk};
use crate::error::{Error, Result};
use crate::expand::expand_topic;
use crate::packer::{distinct_chunk_count, pack, OversizePolicy, PackerConfig, RankedTopic};
use crate::query::{QuerySpec, SourceSelector};
use crate::score::{filter_and_rank, score_chunk, ScoringConfig};
use crate::spatial::{apply_mode, SpatialConfig, SpatialPattern};
use crate::storage::ChunkStore;
use crate::types::{Chunk, DocId, ScoredChunk, TopicId};

/// Fixed pipeline phases reported to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading chunks and indices from the store.
    Retrieve,
    /// Expanding topic questions over the document indices.
    Expand,
    /// Scoring, filtering, and ranking chunks per topic.
    Score,
    /// Packing ranked chunks into super chunks.
    Pack,
    /// Rendering the final envelope text.
    Format,
}

/// Cooperative cancellation flag shared between a query and its caller.
///
/// Cancellation is checked between topics, between phases, and between
/// chunks during scoring. A cancelled query returns [`Error::Cancelled`]
/// and never a partial result.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Clock collaborator for result timestamps; injectable so tests stay
/// deterministic.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Progress callback signature.
pub type ProgressFn = dyn Fn(Phase) + Send + Sync;

/// Per-query context: cancellation and progress reporting.
#[derive(Default)]
pub struct QueryContext {
    /// Cancellation flag; cancel from another task to stop the query.
    pub cancel: CancelToken,
    /// Invoked once per pipeline phase, in order.
    pub progress: Option<Box<ProgressFn>>,
}

impl QueryContext {
    fn report(&self, phase: Phase) {
        if let Some(progress) = &self.progress {
            progress(phase);
        }
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Indexing and expansion parameters.
    pub index: IndexConfig,
    /// Scoring weights and thresholds.
    pub scoring: ScoringConfig,
    /// Spatial classification cutoffs.
    pub spatial: SpatialConfig,
    /// Restrict a chunk matched by several topics to its best-scoring
    /// topic instead of emitting it in every matched section.
    pub dedupe_across_topics: bool,
    /// Oversized-chunk policy.
    pub oversize: OversizePolicy,
}

/// One topic's outcome: its spatial pattern and ranked chunks.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TopicResult {
    /// Topic identifier.
    pub topic_id: TopicId,
    /// The topic's question text.
    pub question: String,
    /// Observed distribution of the topic's matches.
    pub pattern: SpatialPattern,
    /// Selected chunks in ranking order.
    pub chunks: Vec<ScoredChunk>,
}

/// The full outcome of a query.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueryOutcome {
    /// Per-topic results, in query topic order.
    pub topic_results: Vec<TopicResult>,
    /// Rendered super chunks, ready to paste.
    pub super_chunks: Vec<RenderedSuperChunk>,
    /// Distinct chunks selected across all topics.
    pub total_chunks: usize,
    /// Completion time, from the engine's clock.
    pub timestamp: u64,
}

/// The corpus-reduction engine.
pub struct Engine {
    store: Arc<dyn ChunkStore>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl Engine {
    /// An engine over a store with default configuration.
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self {
            store,
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the pipeline configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the clock (tests use a fixed clock for determinism).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build and persist a document's co-occurrence index. This is the
    /// ingestion write path; it never runs during a query.
    pub async fn index_document(&self, doc_id: DocId, text: &str) -> Result<()> {
        let index = build_index(text, &self.config.index);
        self.store.put_vectors(doc_id, &index).await?;
        Ok(())
    }

    /// Execute a query with no cancellation or progress reporting.
    pub async fn execute_query(&self, spec: &QuerySpec) -> Result<QueryOutcome> {
        self.execute_query_with(spec, &QueryContext::default()).await
    }

    /// Execute a query.
    pub async fn execute_query_with(
        &self,
        spec: &QuerySpec,
        ctx: &QueryContext,
    ) -> Result<QueryOutcome> {
        let spec = spec.normalized();
        spec.validate()?;

        ctx.report(Phase::Retrieve);
        let (doc_ids, chunks) = self.retrieve_chunks(&spec).await?;
        let doc_names = self.load_doc_names(&doc_ids).await?;
        let indices = self.load_indices(&doc_ids).await?;
        let index_refs: Vec<(DocId, Option<&CoOccurrenceIndex>)> = indices
            .iter()
            .map(|(doc_id, index)| (*doc_id, index.as_ref()))
            .collect();

        ctx.cancel.check()?;
        ctx.report(Phase::Expand);
        let mut concepts = Vec::with_capacity(spec.topics.len());
        for topic in &spec.topics {
            ctx.cancel.check()?;
            concepts.push(expand_topic(&topic.question, &index_refs, &self.config.index));
        }

        ctx.report(Phase::Score);
        let mut topic_results = Vec::with_capacity(spec.topics.len());
        let mut ranked_topics = Vec::with_capacity(spec.topics.len());
        for (topic, concept) in spec.topics.iter().zip(&concepts) {
            ctx.cancel.check()?;
            let mut scored: Vec<ScoredChunk> = Vec::new();
            for chunk in &chunks {
                ctx.cancel.check()?;
                scored.push(score_chunk(chunk, concept, &self.config.scoring));
            }
            let ranked = filter_and_rank(scored, &self.config.scoring);
            let (kept, pattern) =
                apply_mode(ranked, topic.spatial_category, &self.config.spatial);

            topic_results.push(TopicResult {
                topic_id: topic.topic_id,
                question: topic.question.clone(),
                pattern,
                chunks: kept.clone(),
            });
            ranked_topics.push(RankedTopic {
                topic_id: topic.topic_id,
                question: topic.question.clone(),
                chunks: kept,
            });
        }

        ctx.cancel.check()?;
        ctx.report(Phase::Pack);
        let packer_config = PackerConfig {
            max_chars: spec.effective_max_chars(),
            limit_super_chunks: spec.limit_super_chunks,
            max_super_chunks_per_topic: spec.max_super_chunks_per_topic as usize,
            dedupe_across_topics: self.config.dedupe_across_topics,
            oversize: self.config.oversize,
        };
        let questions: Vec<String> = spec.topics.iter().map(|t| t.question.clone()).collect();
        let packed = pack(&ranked_topics, &questions, &doc_names, &packer_config)?;

        ctx.cancel.check()?;
        ctx.report(Phase::Format);
        let super_chunks = render_package(&packed, &questions, &doc_names);

        Ok(QueryOutcome {
            total_chunks: distinct_chunk_count(&ranked_topics),
            topic_results,
            super_chunks,
            timestamp: self.clock.now_millis(),
        })
    }

    /// Resolve the query's document set and fetch every chunk. Chunks come
    /// back in ascending (document, position) order either way.
    async fn retrieve_chunks(&self, spec: &QuerySpec) -> Result<(Vec<DocId>, Vec<Chunk>)> {
        match &spec.source {
            SourceSelector::Documents { document_ids } => {
                let mut seen = std::collections::HashSet::new();
                let mut doc_ids = Vec::new();
                for &doc_id in document_ids {
                    if seen.insert(doc_id) {
                        doc_ids.push(doc_id);
                    }
                }

                let mut chunks = Vec::new();
                for &doc_id in &doc_ids {
                    chunks.extend(self.store.chunks_by_document(doc_id).await?);
                }
                chunks.sort_by_key(Chunk::chrono_key);
                Ok((doc_ids, chunks))
            }
            SourceSelector::Collection { collection_id } => {
                let mut chunks = self.store.chunks_by_collection(*collection_id).await?;
                chunks.sort_by_key(Chunk::chrono_key);

                let mut doc_ids: Vec<DocId> = chunks.iter().map(|c| c.doc_id).collect();
                doc_ids.sort_unstable();
                doc_ids.dedup();
                Ok((doc_ids, chunks))
            }
        }
    }

    async fn load_doc_names(&self, doc_ids: &[DocId]) -> Result<HashMap<DocId, String>> {
        let mut names = HashMap::with_capacity(doc_ids.len());
        for &doc_id in doc_ids {
            let info = self.store.document(doc_id).await?;
            names.insert(doc_id, info.name);
        }
        Ok(names)
    }

    /// Load stored indices; a document without one degrades expansion to
    /// the original terms rather than failing the query.
    async fn load_indices(
        &self,
        doc_ids: &[DocId],
    ) -> Result<Vec<(DocId, Option<CoOccurrenceIndex>)>> {
        let mut indices = Vec::with_capacity(doc_ids.len());
        for &doc_id in doc_ids {
            indices.push((doc_id, self.store.vectors(doc_id).await?));
        }
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::query::TopicSpec;
    use crate::types::DocumentInfo;

    /// Fixed clock so outcomes are fully deterministic in tests.
    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now_millis(&self) -> u64 {
            self.0
        }
    }

    async fn engine_with_manual() -> Engine {
        let store = MemoryStore::new();
        store.add_document(
            DocumentInfo {
                id: 1,
                name: "manual.txt".to_string(),
            },
            vec![
                Chunk::new(0, 1, 0, "Install the fuel pump. The fuel line must be clean."),
                Chunk::new(1, 1, 1, "Safety procedures require goggles."),
            ],
        );
        let store = Arc::new(store);
        let engine = Engine::new(store.clone()).with_clock(Arc::new(FixedClock(1_700_000_000_000)));
        engine
            .index_document(1, "Install the fuel pump. The fuel line must be clean.")
            .await
            .unwrap();
        engine
    }

    fn fuel_query() -> QuerySpec {
        QuerySpec::documents(vec![1], vec![TopicSpec::new(1, "fuel system")])
    }

    #[tokio::test]
    async fn test_basic_query_selects_matching_chunk() {
        let engine = engine_with_manual().await;
        let outcome = engine.execute_query(&fuel_query()).await.unwrap();

        assert_eq!(outcome.topic_results.len(), 1);
        let result = &outcome.topic_results[0];
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].chunk.chunk_number, 0);
        assert_eq!(outcome.total_chunks, 1);
        assert_eq!(outcome.timestamp, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_validation_runs_before_storage() {
        let engine = engine_with_manual().await;
        let bad = QuerySpec::documents(vec![], vec![TopicSpec::new(1, "fuel")]);
        assert!(matches!(
            engine.execute_query(&bad).await,
            Err(Error::Query(crate::error::QueryError::NoDocuments))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts() {
        let engine = engine_with_manual().await;
        let ctx = QueryContext::default();
        ctx.cancel.cancel();
        assert!(matches!(
            engine.execute_query_with(&fuel_query(), &ctx).await,
            Err(Error::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_progress_phases_in_order() {
        let engine = engine_with_manual().await;
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let ctx = QueryContext {
            cancel: CancelToken::new(),
            progress: Some(Box::new(move |phase| {
                recorder.lock().unwrap().push(phase);
            })),
        };
        engine.execute_query_with(&fuel_query(), &ctx).await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Phase::Retrieve,
                Phase::Expand,
                Phase::Score,
                Phase::Pack,
                Phase::Format
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_index_degrades_gracefully() {
        let store = MemoryStore::new();
        store.add_document(
            DocumentInfo {
                id: 5,
                name: "unindexed.txt".to_string(),
            },
            vec![Chunk::new(0, 5, 0, "the fuel pump sits here")],
        );
        let engine = Engine::new(Arc::new(store));

        let spec = QuerySpec::documents(vec![5], vec![TopicSpec::new(1, "fuel pump")]);
        let outcome = engine.execute_query(&spec).await.unwrap();
        // original terms still match even with no stored index
        assert_eq!(outcome.topic_results[0].chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_determinism_byte_identical_output() {
        let engine = engine_with_manual().await;
        let a = engine.execute_query(&fuel_query()).await.unwrap();
        let b = engine.execute_query(&fuel_query()).await.unwrap();
        let texts_a: Vec<&str> = a.super_chunks.iter().map(|s| s.content.as_str()).collect();
        let texts_b: Vec<&str> = b.super_chunks.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(texts_a, texts_b);
    }

    #[tokio::test]
    async fn test_topic_isolation() {
        let engine = engine_with_manual().await;
        let alone = engine.execute_query(&fuel_query()).await.unwrap();

        let with_other = engine
            .execute_query(&QuerySpec::documents(
                vec![1],
                vec![
                    TopicSpec::new(1, "fuel system"),
                    TopicSpec::new(2, "safety procedures"),
                ],
            ))
            .await
            .unwrap();

        let keys = |r: &TopicResult| -> Vec<(DocId, u32)> {
            r.chunks.iter().map(|s| s.chunk.chrono_key()).collect()
        };
        assert_eq!(keys(&alone.topic_results[0]), keys(&with_other.topic_results[0]));
    }
}
