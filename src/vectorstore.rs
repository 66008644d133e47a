//! Vector store trait for storing and searching vector embeddings.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// An exact-match conjunction over chunk metadata fields.
///
/// Every condition must hold for a record to match; an empty filter matches
/// everything. This is the tenant-isolation mechanism: stores enforce the
/// filter internally (never by post-filtering in the caller), so a search
/// scoped to one `user_id` can never observe another user's records, not
/// even through result counts.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::MetadataFilter;
///
/// let filter = MetadataFilter::new()
///     .eq("user_id", "user-1")
///     .eq("source", "upload");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataFilter {
    conditions: Vec<(String, String)>,
}

impl MetadataFilter {
    /// Create an empty filter (matches every record).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filter matching a single document's chunks.
    pub fn for_document(document_id: &str) -> Self {
        Self::new().eq("document_id", document_id)
    }

    /// Build a filter from a map of field/value pairs.
    ///
    /// Conditions are sorted by field name so the result is deterministic.
    pub fn from_map(fields: &HashMap<String, String>) -> Self {
        let mut conditions: Vec<(String, String)> =
            fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        conditions.sort();
        Self { conditions }
    }

    /// Add an exact-match condition on a metadata field.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Whether the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The filter's conditions, for backends that translate them natively.
    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }

    /// Whether a chunk's metadata satisfies every condition.
    pub fn matches(&self, metadata: &HashMap<String, String>) -> bool {
        self.conditions.iter().all(|(field, value)| metadata.get(field) == Some(value))
    }
}

/// A storage backend for vector embeddings with filtered similarity search.
///
/// Scores are cosine similarity, higher is better, for every backend.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{InMemoryVectorStore, MetadataFilter, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.upsert(&chunks).await?;
/// let filter = MetadataFilter::new().eq("user_id", "user-1");
/// let results = store.search(&query_embedding, 5, &filter).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert chunks, idempotent by chunk id: a later upsert with the same
    /// id replaces the prior record. Chunks must have embeddings set.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()>;

    /// Return at most `limit` records matching `filter`, ordered best
    /// first by similarity score; ties broken by insertion recency (most
    /// recent first).
    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>>;

    /// Remove all records matching `filter`. A no-op (not an error) when
    /// nothing matches.
    async fn delete(&self, filter: &MetadataFilter) -> Result<()>;

    /// Count records matching `filter`.
    async fn count(&self, filter: &MetadataFilter) -> Result<usize>;

    /// Distinct `document_id` values present in the store.
    ///
    /// Used by reconciliation to detect chunks whose metadata record has
    /// gone missing.
    async fn document_ids(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_anything() {
        let filter = MetadataFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&HashMap::new()));
        assert!(filter.matches(&HashMap::from([("k".into(), "v".into())])));
    }

    #[test]
    fn conjunction_requires_all_conditions() {
        let filter = MetadataFilter::new().eq("user_id", "a").eq("source", "upload");
        let mut metadata = HashMap::from([("user_id".to_string(), "a".to_string())]);
        assert!(!filter.matches(&metadata));
        metadata.insert("source".to_string(), "upload".to_string());
        assert!(filter.matches(&metadata));
        metadata.insert("user_id".to_string(), "b".to_string());
        assert!(!filter.matches(&metadata));
    }

    #[test]
    fn from_map_is_deterministic() {
        let map = HashMap::from([
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ]);
        assert_eq!(MetadataFilter::from_map(&map), MetadataFilter::from_map(&map));
        assert_eq!(MetadataFilter::from_map(&map).conditions()[0].0, "a");
    }
}
