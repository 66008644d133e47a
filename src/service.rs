//! Knowledge service: the caller-facing retrieval and management surface.
//!
//! [`KnowledgeService`] wraps an [`IngestPipeline`] and exposes upload,
//! search, lookup, owner-checked delete, and reconciliation. It never
//! touches raw files; queries go straight to the vector store.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::document::{DocumentRecord, DocumentStatus, Principal, SearchResult, UploadRequest};
use crate::error::{RagError, Result};
use crate::jobs::JobStatus;
use crate::pipeline::IngestPipeline;
use crate::vectorstore::MetadataFilter;

/// A detected disagreement between the metadata store and the vector index.
///
/// Reconciliation reports these; it never repairs them by guessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Inconsistency {
    /// A `Ready` record whose chunk count does not match the index.
    ChunkCountMismatch {
        /// The affected document.
        document_id: String,
        /// The chunk count in the metadata record.
        recorded: usize,
        /// The number of chunks actually indexed.
        indexed: usize,
    },
    /// Indexed chunks whose document has no metadata record at all.
    OrphanChunks {
        /// The document id carried by the orphaned chunks.
        document_id: String,
        /// How many chunks are orphaned.
        indexed: usize,
    },
}

/// The document ingestion and retrieval service.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{KnowledgeService, Principal};
///
/// let service = KnowledgeService::new(pipeline);
/// let id = service.upload(request, &principal).await?;
/// let results = service.search("how do I...", &Default::default(), None, Some("user-1")).await?;
/// ```
pub struct KnowledgeService {
    pipeline: IngestPipeline,
}

impl KnowledgeService {
    /// Create a service over an already-built pipeline.
    pub fn new(pipeline: IngestPipeline) -> Self {
        Self { pipeline }
    }

    /// Access the underlying pipeline.
    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    /// Accept an upload; see [`IngestPipeline::upload`].
    pub async fn upload(&self, request: UploadRequest, principal: &Principal) -> Result<String> {
        self.pipeline.upload(request, principal).await
    }

    /// The ingestion job status for a document id, if this process has
    /// accepted it.
    pub async fn job_status(&self, document_id: &str) -> Option<JobStatus> {
        self.pipeline.job_status(document_id).await
    }

    /// Search indexed chunks by semantic similarity.
    ///
    /// `filters` are exact-match conditions over chunk metadata; when
    /// `user_id` is given it is merged in, and the store enforces it so no
    /// other user's chunks can appear. `limit` defaults to the configured
    /// `default_limit` (5); fewer matches than `limit` returns what exists.
    ///
    /// An empty query string is permitted: it is embedded like any other
    /// text, and the resulting ordering is whatever the store returns for
    /// that vector (implementation-defined, not asserted anywhere).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] for `limit == 0`; embedding and
    /// store failures propagate.
    pub async fn search(
        &self,
        query: &str,
        filters: &HashMap<String, String>,
        limit: Option<usize>,
        user_id: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let limit = limit.unwrap_or(self.pipeline.config().default_limit);
        if limit == 0 {
            return Err(RagError::Validation("limit must be a positive integer".to_string()));
        }

        let mut filter = MetadataFilter::from_map(filters);
        if let Some(user_id) = user_id {
            filter = filter.eq("user_id", user_id);
        }

        let embedding = self.pipeline.embedding_provider().embed(query).await?;
        let results = self.pipeline.vector_store().search(&embedding, limit, &filter).await?;

        info!(query_len = query.len(), limit, result_count = results.len(), "search completed");
        Ok(results)
    }

    /// Look up a document's metadata record.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] for an unknown id. A known id whose
    /// ingestion is still running comes back with
    /// [`DocumentStatus::Processing`].
    pub async fn get(&self, document_id: &str) -> Result<DocumentRecord> {
        self.pipeline
            .metadata_store()
            .get(document_id)
            .await?
            .ok_or_else(|| RagError::NotFound(document_id.to_string()))
    }

    /// Delete a document: its metadata record and every indexed chunk.
    ///
    /// Only the owner or a privileged principal may delete. The deletion
    /// runs under the document's write lock so it cannot interleave with
    /// an in-flight ingestion of the same id.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] for an unknown id and
    /// [`RagError::Authorization`] for a non-owner, non-privileged caller
    /// (with the document left fully intact).
    pub async fn delete(&self, document_id: &str, principal: &Principal) -> Result<()> {
        let record = self.get(document_id).await?;
        if record.user_id != principal.user_id && !principal.is_privileged {
            return Err(RagError::Authorization(format!(
                "user '{}' does not own document '{document_id}'",
                principal.user_id
            )));
        }

        let _guard = self.pipeline.lock_document(document_id).await;
        self.pipeline.metadata_store().delete(document_id).await?;
        self.pipeline
            .vector_store()
            .delete(&MetadataFilter::for_document(document_id))
            .await?;

        info!(document_id = %document_id, user_id = %principal.user_id, "deleted document");
        Ok(())
    }

    /// Scan for metadata/index disagreements and report them.
    ///
    /// Checks every `Ready` record's chunk count against the index, and
    /// looks for indexed chunks whose document has no record. Documents
    /// still `Processing` are skipped — their in-flight window is expected
    /// to disagree.
    pub async fn reconcile(&self) -> Result<Vec<Inconsistency>> {
        let records = self.pipeline.metadata_store().list().await?;
        let known_ids: HashSet<&str> = records.iter().map(|r| r.document_id.as_str()).collect();
        let mut findings = Vec::new();

        for record in &records {
            if record.status != DocumentStatus::Ready {
                continue;
            }
            let indexed = self
                .pipeline
                .vector_store()
                .count(&MetadataFilter::for_document(&record.document_id))
                .await?;
            if indexed != record.chunk_count {
                warn!(
                    document_id = %record.document_id,
                    recorded = record.chunk_count,
                    indexed,
                    "chunk count mismatch"
                );
                findings.push(Inconsistency::ChunkCountMismatch {
                    document_id: record.document_id.clone(),
                    recorded: record.chunk_count,
                    indexed,
                });
            }
        }

        for document_id in self.pipeline.vector_store().document_ids().await? {
            if !known_ids.contains(document_id.as_str()) {
                let indexed = self
                    .pipeline
                    .vector_store()
                    .count(&MetadataFilter::for_document(&document_id))
                    .await?;
                warn!(document_id = %document_id, indexed, "orphaned chunks without a record");
                findings.push(Inconsistency::OrphanChunks { document_id, indexed });
            }
        }

        Ok(findings)
    }
}
