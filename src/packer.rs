//! Topic-grouped packing of ranked chunks into size-bounded super chunks.
//!
//! Ranking decides which chunks are worth carrying; packing re-orders each
//! topic's selection chronologically and fills super chunks greedily in a
//! single pass, budgeting against the exact envelope the formatter emits.

use std::collections::HashMap;

use crate::envelope;
use crate::error::{Error, Result};
use crate::types::{DocId, ScoredChunk, SuperChunk, TopicId, TopicSection};

/// Default per-topic super-chunk cap when limiting is enabled.
const DEFAULT_MAX_PER_TOPIC: usize = 3;

/// What to do when a single chunk's envelope alone exceeds the size limit.
/// Either way the chunk is never silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OversizePolicy {
    /// Emit the chunk oversize and log a warning.
    #[default]
    Emit,
    /// Abort the query with [`Error::OversizedChunk`].
    Fail,
}

/// Packing configuration for one query.
#[derive(Debug, Clone)]
pub struct PackerConfig {
    /// Size budget per super chunk, in bytes of rendered envelope.
    pub max_chars: usize,
    /// Enforce the per-topic super-chunk cap after packing.
    pub limit_super_chunks: bool,
    /// Cap on super chunks whose primary topic is any one topic.
    pub max_super_chunks_per_topic: usize,
    /// Restrict a chunk matched by several topics to its best-scoring
    /// topic instead of emitting it in every matched section.
    pub dedupe_across_topics: bool,
    /// Oversized-chunk policy.
    pub oversize: OversizePolicy,
}

impl PackerConfig {
    /// Configuration with the given size budget and default behavior.
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            limit_super_chunks: false,
            max_super_chunks_per_topic: DEFAULT_MAX_PER_TOPIC,
            dedupe_across_topics: false,
            oversize: OversizePolicy::default(),
        }
    }
}

/// One topic's ranked selection, ready for packing.
#[derive(Debug, Clone)]
pub struct RankedTopic {
    /// Topic identifier.
    pub topic_id: TopicId,
    /// The topic's question text.
    pub question: String,
    /// Selected chunks in ranking order.
    pub chunks: Vec<ScoredChunk>,
}

/// Number of distinct chunks across all topics, keyed by
/// (document, position); a chunk matched by several topics counts once.
pub fn distinct_chunk_count(topics: &[RankedTopic]) -> usize {
    let mut keys: Vec<(DocId, u32)> = topics
        .iter()
        .flat_map(|t| t.chunks.iter().map(|s| s.chunk.chrono_key()))
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys.len()
}

/// Pack ranked topics into super chunks.
///
/// `questions` is the full list of the query's topic questions; the first
/// super chunk's budget includes the package header built from them.
/// Topic order is preserved; within each section chunks appear in
/// ascending (document, position) order. Each super chunk's accounted
/// size stays within `max_chars` except for the degenerate single
/// oversized chunk, handled per the configured policy.
pub fn pack(
    topics: &[RankedTopic],
    questions: &[String],
    doc_names: &HashMap<DocId, String>,
    config: &PackerConfig,
) -> Result<Vec<SuperChunk>> {
    let topics = if config.dedupe_across_topics {
        dedupe_topics(topics)
    } else {
        topics.to_vec()
    };

    let mut packer = Packer::new(questions, doc_names, config);
    for topic in &topics {
        if topic.chunks.is_empty() {
            continue;
        }
        packer.add_topic(topic)?;
    }
    let mut packed = packer.finish();

    if config.limit_super_chunks {
        enforce_topic_limit(&mut packed, config.max_super_chunks_per_topic);
    }

    Ok(packed)
}

/// Keep each chunk only in its best-scoring topic (earliest topic wins
/// ties), preserving each topic's ranking order otherwise.
fn dedupe_topics(topics: &[RankedTopic]) -> Vec<RankedTopic> {
    let mut best: HashMap<(DocId, u32), (usize, f32)> = HashMap::new();
    for (topic_idx, topic) in topics.iter().enumerate() {
        for scored in &topic.chunks {
            let key = scored.chunk.chrono_key();
            match best.get(&key) {
                Some(&(_, score)) if score >= scored.relevance_score => {}
                _ => {
                    best.insert(key, (topic_idx, scored.relevance_score));
                }
            }
        }
    }

    topics
        .iter()
        .enumerate()
        .map(|(topic_idx, topic)| RankedTopic {
            topic_id: topic.topic_id,
            question: topic.question.clone(),
            chunks: topic
                .chunks
                .iter()
                .filter(|s| best[&s.chunk.chrono_key()].0 == topic_idx)
                .cloned()
                .collect(),
        })
        .collect()
}

/// Keep at most `max_per_topic` super chunks per primary topic, in order.
/// The first surviving super chunk carries the package header.
fn enforce_topic_limit(packed: &mut Vec<SuperChunk>, max_per_topic: usize) {
    let mut counts: HashMap<TopicId, usize> = HashMap::new();
    packed.retain(|sc| match sc.primary_topic() {
        Some(topic) => {
            let count = counts.entry(topic).or_insert(0);
            *count += 1;
            *count <= max_per_topic
        }
        None => false,
    });
    for (i, sc) in packed.iter_mut().enumerate() {
        sc.is_first = i == 0;
    }
}

/// Greedy single-pass packing state.
struct Packer<'a> {
    questions: &'a [String],
    doc_names: &'a HashMap<DocId, String>,
    config: &'a PackerConfig,
    out: Vec<SuperChunk>,
    current: SuperChunk,
    current_chars: usize,
    current_chunks: usize,
    sc_index: usize,
}

impl<'a> Packer<'a> {
    fn new(
        questions: &'a [String],
        doc_names: &'a HashMap<DocId, String>,
        config: &'a PackerConfig,
    ) -> Self {
        Self {
            questions,
            doc_names,
            config,
            out: Vec::new(),
            current: SuperChunk {
                topics: Vec::new(),
                total_chars: 0,
                is_first: true,
            },
            current_chars: 0,
            current_chunks: 0,
            sc_index: 1,
        }
    }

    fn add_topic(&mut self, topic: &RankedTopic) -> Result<()> {
        let mut chunks = topic.chunks.clone();
        chunks.sort_by_key(|s| s.chunk.chrono_key());

        let mut emitted_before = 0usize;
        let mut section = TopicSection::new(topic.topic_id, &topic.question, false);

        for scored in chunks {
            let env = envelope::chunk_envelope(
                scored.chunk.chunk_number,
                scored.relevance_score,
                &scored.chunk.content,
            );
            let need = self.cost_in_current(&section, &scored, &env);

            if self.current_chars + need > self.config.max_chars && self.current_chunks > 0 {
                // Close the super chunk and continue the topic in a new one.
                if !section.chunks.is_empty() {
                    emitted_before += section.chunks.len();
                    self.current.topics.push(section);
                }
                self.rotate();
                section = TopicSection::new(topic.topic_id, &topic.question, emitted_before > 0);

                let need = self.cost_in_current(&section, &scored, &env);
                if self.current_chars + need > self.config.max_chars {
                    self.handle_oversize(&scored, need)?;
                }
                self.push_chunk(&mut section, scored, need);
            } else {
                if self.current_chars + need > self.config.max_chars {
                    // Nothing packed yet anywhere: the chunk alone is too big.
                    self.handle_oversize(&scored, need)?;
                }
                self.push_chunk(&mut section, scored, need);
            }
        }

        if !section.chunks.is_empty() {
            self.current.topics.push(section);
        }
        Ok(())
    }

    /// Cost of appending a chunk to the open section inside the current
    /// super chunk, measured on the exact envelope text. A super chunk's
    /// first content also pays for the frame, the package footer reserve,
    /// and (in the first super chunk) the package header.
    fn cost_in_current(&self, section: &TopicSection, scored: &ScoredChunk, env: &str) -> usize {
        let frame = if self.current_chars == 0 {
            let open =
                envelope::super_chunk_open(self.sc_index, envelope::TOTAL_COUNT_RESERVE).len();
            let close = envelope::super_chunk_close(self.sc_index).len();
            let header = if self.out.is_empty() {
                envelope::package_header(self.questions).len()
            } else {
                0
            };
            open + close + envelope::PACKAGE_FOOTER.len() + header
        } else {
            0
        };

        let section_cost = if section.chunks.is_empty() {
            let doc_name = envelope::document_label(self.doc_names, scored.chunk.doc_id);
            let header = envelope::section_header(
                &section.topic_question,
                section.is_continuation,
                &doc_name,
            );
            // a joining newline separates this section from a previous one
            header.len() + usize::from(!self.current.topics.is_empty())
        } else {
            1
        };

        frame + section_cost + env.len()
    }

    fn push_chunk(&mut self, section: &mut TopicSection, scored: ScoredChunk, need: usize) {
        section.chunks.push(scored);
        self.current_chars += need;
        self.current_chunks += 1;
    }

    fn rotate(&mut self) {
        if !self.current.topics.is_empty() {
            self.current.total_chars = self.current_chars as u32;
            let finished = std::mem::replace(
                &mut self.current,
                SuperChunk {
                    topics: Vec::new(),
                    total_chars: 0,
                    is_first: false,
                },
            );
            self.out.push(finished);
        }
        self.current.is_first = self.out.is_empty();
        self.current_chars = 0;
        self.current_chunks = 0;
        self.sc_index = self.out.len() + 1;
    }

    fn handle_oversize(&self, scored: &ScoredChunk, need: usize) -> Result<()> {
        match self.config.oversize {
            OversizePolicy::Fail => Err(Error::OversizedChunk {
                doc_id: scored.chunk.doc_id,
                chunk_number: scored.chunk.chunk_number,
                needed: need as u32,
                limit: self.config.max_chars as u32,
            }),
            OversizePolicy::Emit => {
                tracing::warn!(
                    doc_id = scored.chunk.doc_id,
                    chunk_number = scored.chunk.chunk_number,
                    needed = need,
                    limit = self.config.max_chars,
                    "chunk envelope exceeds the super-chunk limit; emitting oversize"
                );
                Ok(())
            }
        }
    }

    fn finish(mut self) -> Vec<SuperChunk> {
        if !self.current.topics.is_empty() {
            self.current.total_chars = self.current_chars as u32;
            self.out.push(self.current);
        }
        self.out
    }
}
