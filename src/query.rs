//! Query structures: the request the engine executes, tier presets, and
//! input validation.

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::spatial::SpatialMode;
use crate::types::{CollectionId, DocId, TopicId};

/// The query format version this crate produces.
pub const QUERY_VERSION: &str = "2.3";

/// Accepted range for the per-topic super-chunk limit.
const LIMIT_RANGE: std::ops::RangeInclusive<u32> = 1..=10;

/// Default per-topic super-chunk limit.
const DEFAULT_MAX_PER_TOPIC: u32 = 3;

/// Downstream chat-model paste-size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    /// Typical chat-model paste limits.
    #[default]
    Standard,
    /// Large-context chat models.
    Large,
}

impl AccountTier {
    /// Preset super-chunk size in bytes.
    pub fn super_chunk_size(self) -> u32 {
        match self {
            AccountTier::Standard => 30_000,
            AccountTier::Large => 100_000,
        }
    }

    /// Preset total package size in bytes.
    pub fn package_size(self) -> u32 {
        match self {
            AccountTier::Standard => 75_000,
            AccountTier::Large => 150_000,
        }
    }

    /// Parse a tier name; unrecognized names are an input error.
    pub fn parse(name: &str) -> Result<Self, QueryError> {
        match name {
            "standard" => Ok(AccountTier::Standard),
            "large" => Ok(AccountTier::Large),
            other => Err(QueryError::UnknownTier(other.to_string())),
        }
    }
}

/// One user-authored topic within a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSpec {
    /// Topic identifier; 0 is treated as unassigned and normalized away.
    #[serde(default)]
    pub topic_id: TopicId,
    /// The natural-language question.
    pub question: String,
    /// Spatial filter mode for this topic.
    #[serde(default)]
    pub spatial_category: SpatialMode,
}

impl TopicSpec {
    /// A topic with the default (auto) spatial mode.
    pub fn new(topic_id: TopicId, question: impl Into<String>) -> Self {
        Self {
            topic_id,
            question: question.into(),
            spatial_category: SpatialMode::Auto,
        }
    }
}

/// Which documents the query runs over.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "sourceType", rename_all = "lowercase")]
pub enum SourceSelector {
    /// An explicit document list.
    #[serde(rename_all = "camelCase")]
    Documents {
        /// The selected documents.
        document_ids: Vec<DocId>,
    },
    /// Every document of a named collection.
    #[serde(rename_all = "camelCase")]
    Collection {
        /// The selected collection.
        collection_id: CollectionId,
    },
}

/// A corpus-reduction query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    /// Query format version; older payloads are normalized up.
    #[serde(default = "default_version")]
    pub version: String,
    /// Paste-size class of the downstream model.
    #[serde(default)]
    pub account_tier: AccountTier,
    /// Byte budget per super chunk; defaults to the tier preset.
    #[serde(default)]
    pub max_chars_per_super_chunk: Option<u32>,
    /// Document selection.
    #[serde(flatten)]
    pub source: SourceSelector,
    /// The topics to retrieve for, in output order.
    pub topics: Vec<TopicSpec>,
    /// Enforce the per-topic super-chunk cap.
    #[serde(default)]
    pub limit_super_chunks: bool,
    /// Per-topic super-chunk cap (1..=10).
    #[serde(default = "default_max_per_topic")]
    pub max_super_chunks_per_topic: u32,
}

fn default_version() -> String {
    QUERY_VERSION.to_string()
}

fn default_max_per_topic() -> u32 {
    DEFAULT_MAX_PER_TOPIC
}

impl QuerySpec {
    /// A query over an explicit document list.
    pub fn documents(document_ids: Vec<DocId>, topics: Vec<TopicSpec>) -> Self {
        Self {
            version: default_version(),
            account_tier: AccountTier::default(),
            max_chars_per_super_chunk: None,
            source: SourceSelector::Documents { document_ids },
            topics,
            limit_super_chunks: false,
            max_super_chunks_per_topic: DEFAULT_MAX_PER_TOPIC,
        }
    }

    /// A query over a collection.
    pub fn collection(collection_id: CollectionId, topics: Vec<TopicSpec>) -> Self {
        Self {
            source: SourceSelector::Collection { collection_id },
            ..Self::documents(Vec::new(), topics)
        }
    }

    /// The effective super-chunk byte budget: the explicit value when
    /// present, the tier preset otherwise.
    pub fn effective_max_chars(&self) -> usize {
        self.max_chars_per_super_chunk
            .unwrap_or_else(|| self.account_tier.super_chunk_size()) as usize
    }

    /// Populate defaults legacy payloads omit: the version string and
    /// unassigned topic ids (0 becomes the topic's 1-based position).
    pub fn normalized(&self) -> Self {
        let mut spec = self.clone();
        if spec.version.is_empty() {
            spec.version = default_version();
        }
        for (i, topic) in spec.topics.iter_mut().enumerate() {
            if topic.topic_id == 0 {
                topic.topic_id = i as TopicId + 1;
            }
        }
        spec
    }

    /// Validate the query before any work starts.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.topics.is_empty() {
            return Err(QueryError::NoTopics);
        }
        for topic in &self.topics {
            if topic.question.trim().is_empty() {
                return Err(QueryError::EmptyQuestion(topic.topic_id));
            }
        }
        if let SourceSelector::Documents { document_ids } = &self.source {
            if document_ids.is_empty() {
                return Err(QueryError::NoDocuments);
            }
        }
        if !LIMIT_RANGE.contains(&self.max_super_chunks_per_topic) {
            return Err(QueryError::InvalidLimit(self.max_super_chunks_per_topic));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_presets() {
        assert_eq!(AccountTier::Standard.super_chunk_size(), 30_000);
        assert_eq!(AccountTier::Standard.package_size(), 75_000);
        assert_eq!(AccountTier::Large.super_chunk_size(), 100_000);
        assert_eq!(AccountTier::Large.package_size(), 150_000);
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!(AccountTier::parse("standard").unwrap(), AccountTier::Standard);
        assert_eq!(AccountTier::parse("large").unwrap(), AccountTier::Large);
        assert!(matches!(
            AccountTier::parse("enterprise"),
            Err(QueryError::UnknownTier(_))
        ));
    }

    #[test]
    fn test_deserialize_documents_query() {
        let json = r#"{
            "version": "2.3",
            "accountTier": "standard",
            "maxCharsPerSuperChunk": 30000,
            "sourceType": "documents",
            "documentIds": [1, 2],
            "topics": [
                { "topicId": 1, "question": "fuel system", "spatialCategory": "auto" }
            ],
            "limitSuperChunks": false,
            "maxSuperChunksPerTopic": 3
        }"#;
        let spec: QuerySpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.version, "2.3");
        assert_eq!(spec.effective_max_chars(), 30_000);
        assert!(matches!(
            spec.source,
            SourceSelector::Documents { ref document_ids } if document_ids == &vec![1, 2]
        ));
        assert_eq!(spec.topics[0].question, "fuel system");
        assert_eq!(spec.topics[0].spatial_category, SpatialMode::Auto);
        spec.validate().unwrap();
    }

    #[test]
    fn test_deserialize_collection_query_with_defaults() {
        let json = r#"{
            "sourceType": "collection",
            "collectionId": 7,
            "topics": [ { "question": "safety procedures" } ]
        }"#;
        let spec: QuerySpec = serde_json::from_str(json).unwrap();
        assert!(matches!(
            spec.source,
            SourceSelector::Collection { collection_id: 7 }
        ));
        assert_eq!(spec.account_tier, AccountTier::Standard);
        assert_eq!(spec.max_super_chunks_per_topic, 3);
        // preset kicks in when no explicit budget is given
        assert_eq!(spec.effective_max_chars(), 30_000);
    }

    #[test]
    fn test_normalized_assigns_topic_ids() {
        let spec = QuerySpec::documents(
            vec![1],
            vec![TopicSpec::new(0, "first"), TopicSpec::new(0, "second")],
        )
        .normalized();
        assert_eq!(spec.topics[0].topic_id, 1);
        assert_eq!(spec.topics[1].topic_id, 2);
    }

    #[test]
    fn test_validate_rejects_empty_topics() {
        let spec = QuerySpec::documents(vec![1], vec![]);
        assert!(matches!(spec.validate(), Err(QueryError::NoTopics)));
    }

    #[test]
    fn test_validate_rejects_blank_question() {
        let spec = QuerySpec::documents(vec![1], vec![TopicSpec::new(4, "   ")]);
        assert!(matches!(
            spec.validate(),
            Err(QueryError::EmptyQuestion(4))
        ));
    }

    #[test]
    fn test_validate_rejects_no_documents() {
        let spec = QuerySpec::documents(vec![], vec![TopicSpec::new(1, "fuel")]);
        assert!(matches!(spec.validate(), Err(QueryError::NoDocuments)));
    }

    #[test]
    fn test_validate_rejects_bad_limit() {
        let mut spec = QuerySpec::documents(vec![1], vec![TopicSpec::new(1, "fuel")]);
        spec.max_super_chunks_per_topic = 0;
        assert!(matches!(spec.validate(), Err(QueryError::InvalidLimit(0))));
        spec.max_super_chunks_per_topic = 11;
        assert!(matches!(spec.validate(), Err(QueryError::InvalidLimit(11))));
    }

    #[test]
    fn test_explicit_budget_overrides_tier() {
        let mut spec = QuerySpec::documents(vec![1], vec![TopicSpec::new(1, "fuel")]);
        spec.max_chars_per_super_chunk = Some(5000);
        assert_eq!(spec.effective_max_chars(), 5000);
    }
}
