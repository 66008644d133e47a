//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] is a zero-dependency store backed by a `HashMap`
//! protected by a `tokio::sync::RwLock`. It is suitable for development,
//! testing, and small-scale use.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, SearchResult};
use crate::error::Result;
use crate::vectorstore::{MetadataFilter, VectorStore};

struct StoredChunk {
    chunk: Chunk,
    /// Monotonic insertion sequence; refreshed on upsert. Breaks score
    /// ties most-recent-first.
    seq: u64,
}

/// An in-memory vector store using cosine similarity for search.
///
/// Scores are cosine similarity, higher is better. Equal scores are ordered
/// by insertion recency, most recent first, so search results are
/// deterministic.
#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<HashMap<String, StoredChunk>>,
    next_seq: AtomicU64,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        let mut records = self.records.write().await;
        for chunk in chunks {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            records.insert(chunk.id.clone(), StoredChunk { chunk: chunk.clone(), seq });
        }
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>> {
        let records = self.records.read().await;

        let mut scored: Vec<(f32, u64, &StoredChunk)> = records
            .values()
            .filter(|stored| filter.matches(&stored.chunk.metadata))
            .map(|stored| (cosine_similarity(&stored.chunk.embedding, embedding), stored.seq, stored))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(b.1.cmp(&a.1))
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(score, _, stored)| SearchResult { chunk: stored.chunk.clone(), score })
            .collect())
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<()> {
        let mut records = self.records.write().await;
        records.retain(|_, stored| !filter.matches(&stored.chunk.metadata));
        Ok(())
    }

    async fn count(&self, filter: &MetadataFilter) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records.values().filter(|stored| filter.matches(&stored.chunk.metadata)).count())
    }

    async fn document_ids(&self) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let ids: HashSet<String> =
            records.values().map(|stored| stored.chunk.document_id.clone()).collect();
        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, user: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: format!("text of {id}"),
            embedding,
            metadata: HashMap::from([
                ("user_id".to_string(), user.to_string()),
                ("document_id".to_string(), "doc-1".to_string()),
            ]),
            document_id: "doc-1".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_id() {
        let store = InMemoryVectorStore::new();
        let mut c = chunk("c-1", "a", vec![1.0, 0.0]);
        store.upsert(std::slice::from_ref(&c)).await.unwrap();
        c.text = "replacement".to_string();
        store.upsert(&[c]).await.unwrap();

        assert_eq!(store.count(&MetadataFilter::new()).await.unwrap(), 1);
        let results = store.search(&[1.0, 0.0], 10, &MetadataFilter::new()).await.unwrap();
        assert_eq!(results[0].chunk.text, "replacement");
    }

    #[tokio::test]
    async fn search_enforces_user_filter() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                chunk("a-1", "alice", vec![1.0, 0.0]),
                chunk("b-1", "bob", vec![1.0, 0.0]),
                chunk("b-2", "bob", vec![0.9, 0.1]),
            ])
            .await
            .unwrap();

        let filter = MetadataFilter::new().eq("user_id", "alice");
        let results = store.search(&[1.0, 0.0], 10, &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "a-1");
    }

    #[tokio::test]
    async fn ties_break_most_recent_first() {
        let store = InMemoryVectorStore::new();
        store.upsert(&[chunk("old", "a", vec![1.0, 0.0])]).await.unwrap();
        store.upsert(&[chunk("new", "a", vec![1.0, 0.0])]).await.unwrap();

        let results = store.search(&[1.0, 0.0], 10, &MetadataFilter::new()).await.unwrap();
        assert_eq!(results[0].chunk.id, "new");
        assert_eq!(results[1].chunk.id, "old");
    }

    #[tokio::test]
    async fn delete_by_filter_is_noop_when_nothing_matches() {
        let store = InMemoryVectorStore::new();
        store.upsert(&[chunk("c-1", "a", vec![1.0, 0.0])]).await.unwrap();
        store.delete(&MetadataFilter::for_document("doc-404")).await.unwrap();
        assert_eq!(store.count(&MetadataFilter::new()).await.unwrap(), 1);

        store.delete(&MetadataFilter::for_document("doc-1")).await.unwrap();
        assert_eq!(store.count(&MetadataFilter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_returns_all_when_limit_exceeds_matches() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[chunk("c-1", "a", vec![1.0, 0.0]), chunk("c-2", "a", vec![0.5, 0.5])])
            .await
            .unwrap();
        let results = store.search(&[1.0, 0.0], 50, &MetadataFilter::new()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
    }
}
