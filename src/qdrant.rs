//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`], a [`VectorStore`] over the
//! [qdrant-client](https://docs.rs/qdrant-client) gRPC API. Only available
//! when the `qdrant` feature is enabled.
//!
//! Collections are created with cosine distance, so scores returned by
//! Qdrant agree with the crate-wide higher-is-better convention.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    Filter, PointId, PointStruct, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;
use uuid::Uuid;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{MetadataFilter, VectorStore};

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// All operations are scoped to one collection. Chunk metadata is stored as
/// a nested `metadata` payload object; filters translate to Qdrant `must`
/// conditions over `metadata.{field}`, enforced server-side.
///
/// Qdrant requires UUID or integer point ids, so the point id is a UUIDv5
/// derived from the chunk id — upserts of the same chunk id stay idempotent
/// — while the original chunk id is preserved in the payload.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorStore {
    /// Create a store connecting to the given URL, scoped to `collection`.
    pub fn new(url: &str, collection: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self { client, collection: collection.into() })
    }

    /// Create a store from an existing client.
    pub fn from_client(client: Qdrant, collection: impl Into<String>) -> Self {
        Self { client, collection: collection.into() }
    }

    /// Create the collection with cosine distance if it does not exist.
    pub async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        let collections = self.client.list_collections().await.map_err(Self::map_err)?;
        if collections.collections.iter().any(|c| c.name == self.collection) {
            debug!(collection = %self.collection, "qdrant collection already exists");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = %self.collection, dimensions, "created qdrant collection");
        Ok(())
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorStore { backend: "qdrant".to_string(), message: e.to_string() }
    }

    /// Translate a [`MetadataFilter`] into a Qdrant `must` filter.
    fn to_filter(filter: &MetadataFilter) -> Option<Filter> {
        if filter.is_empty() {
            return None;
        }
        let conditions: Vec<Condition> = filter
            .conditions()
            .iter()
            .map(|(field, value)| Condition::matches(format!("metadata.{field}"), value.clone()))
            .collect();
        Some(Filter::must(conditions))
    }

    fn point_id_for(chunk_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
    }

    /// Extract a string from a Qdrant payload value.
    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn metadata_from_payload(
        payload: &HashMap<String, QdrantValue>,
    ) -> HashMap<String, String> {
        payload
            .get("metadata")
            .and_then(|v| match &v.kind {
                Some(Kind::StructValue(s)) => Some(
                    s.fields
                        .iter()
                        .filter_map(|(k, v)| Self::extract_string(v).map(|s| (k.clone(), s)))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .iter()
            .map(|chunk| {
                let mut payload_map = serde_json::Map::new();
                payload_map
                    .insert("text".to_string(), serde_json::Value::String(chunk.text.clone()));
                payload_map.insert(
                    "document_id".to_string(),
                    serde_json::Value::String(chunk.document_id.clone()),
                );
                let metadata_obj: serde_json::Map<String, serde_json::Value> = chunk
                    .metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect();
                payload_map.insert("metadata".to_string(), serde_json::Value::Object(metadata_obj));

                let payload =
                    Payload::try_from(serde_json::Value::Object(payload_map)).unwrap_or_default();

                PointStruct::new(Self::point_id_for(&chunk.id), chunk.embedding.clone(), payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection = %self.collection, count = chunks.len(), "upserted chunks to qdrant");
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>> {
        let mut builder =
            SearchPointsBuilder::new(&self.collection, embedding.to_vec(), limit as u64)
                .with_payload(true);
        if let Some(f) = Self::to_filter(filter) {
            builder = builder.filter(f);
        }

        let response = self.client.search_points(builder).await.map_err(Self::map_err)?;

        let results = response
            .result
            .into_iter()
            .map(|scored| {
                let metadata = Self::metadata_from_payload(&scored.payload);
                let id = metadata.get("chunk_id").cloned().unwrap_or_default();
                let text =
                    scored.payload.get("text").and_then(Self::extract_string).unwrap_or_default();
                let document_id = scored
                    .payload
                    .get("document_id")
                    .and_then(Self::extract_string)
                    .unwrap_or_default();

                SearchResult {
                    chunk: Chunk { id, text, embedding: vec![], metadata, document_id },
                    score: scored.score,
                }
            })
            .collect();

        Ok(results)
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<()> {
        // An empty filter matches everything.
        let qdrant_filter = Self::to_filter(filter).unwrap_or_default();

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection).points(qdrant_filter).wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = %self.collection, "deleted points from qdrant");
        Ok(())
    }

    async fn count(&self, filter: &MetadataFilter) -> Result<usize> {
        let mut builder = CountPointsBuilder::new(&self.collection).exact(true);
        if let Some(f) = Self::to_filter(filter) {
            builder = builder.filter(f);
        }

        let response = self.client.count(builder).await.map_err(Self::map_err)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn document_ids(&self) -> Result<Vec<String>> {
        let mut ids: HashSet<String> = HashSet::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .limit(256)
                .with_payload(true)
                .with_vectors(false);
            if let Some(o) = offset.take() {
                builder = builder.offset(o);
            }

            let response = self.client.scroll(builder).await.map_err(Self::map_err)?;
            for point in &response.result {
                if let Some(id) =
                    point.payload.get("document_id").and_then(Self::extract_string)
                {
                    ids.insert(id);
                }
            }

            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(ids.into_iter().collect())
    }
}
