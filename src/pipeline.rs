//! Ingestion pipeline orchestrator.
//!
//! The [`IngestPipeline`] accepts uploads, returns a document id
//! immediately, and runs the rest of the work — load → chunk → embed →
//! index → persist — on a background worker pool. Build one via
//! [`IngestPipeline::builder()`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docrag::{IngestPipeline, InMemoryMetadataStore, InMemoryVectorStore, RagConfig};
//!
//! let pipeline = IngestPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .metadata_store(Arc::new(InMemoryMetadataStore::new()))
//!     .build()?;
//!
//! let document_id = pipeline.upload(request, &principal).await?;
//! // ... poll pipeline.job_status(&document_id) or the metadata record
//! ```

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chunking::{Chunker, SemanticChunker};
use crate::config::RagConfig;
use crate::document::{DocumentRecord, DocumentStatus, FileType, Principal, UploadRequest};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::jobs::{DocumentLocks, IngestJob, JobStatus, JobTracker, Stage};
use crate::loader::Loader;
use crate::metadata::{DocumentUpdate, MetadataStore};
use crate::vectorstore::VectorStore;

/// Capacity of the ingestion job queue.
const QUEUE_CAPACITY: usize = 256;

/// The ingestion pipeline: upload intake plus a background worker pool.
///
/// Dropping the pipeline closes the queue; workers finish the jobs already
/// accepted and then exit.
pub struct IngestPipeline {
    inner: Arc<PipelineInner>,
    queue: mpsc::Sender<IngestJob>,
}

struct PipelineInner {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    metadata_store: Arc<dyn MetadataStore>,
    chunker: Arc<dyn Chunker>,
    jobs: JobTracker,
    locks: DocumentLocks,
}

impl IngestPipeline {
    /// Create a new [`IngestPipelineBuilder`].
    pub fn builder() -> IngestPipelineBuilder {
        IngestPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.inner.vector_store
    }

    /// Return a reference to the metadata store.
    pub fn metadata_store(&self) -> &Arc<dyn MetadataStore> {
        &self.inner.metadata_store
    }

    /// Accept an upload and return its assigned document id immediately.
    ///
    /// The file bytes are written to a scoped temporary file, a metadata
    /// record is created with [`DocumentStatus::Processing`], and the job
    /// is queued for the worker pool. The caller observes completion by
    /// polling the metadata record (status `Ready`/`Failed`) or
    /// [`job_status`](IngestPipeline::job_status).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] for a missing title or filename;
    /// pipeline-start failures surface as [`RagError::Pipeline`] or I/O
    /// errors. Background-stage failures never surface here.
    pub async fn upload(&self, request: UploadRequest, principal: &Principal) -> Result<String> {
        if request.title.trim().is_empty() {
            return Err(RagError::Validation("title must not be empty".to_string()));
        }
        if request.filename.trim().is_empty() {
            return Err(RagError::Validation("filename must not be empty".to_string()));
        }

        let document_id = Uuid::new_v4().to_string();
        let file_type = FileType::from_filename(&request.filename);
        let file_size = request.file_bytes.len() as u64;

        // Spool the upload to a scoped temp file; the job owns it and RAII
        // deletes it on every exit path.
        let bytes = request.file_bytes;
        let temp_file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut file = NamedTempFile::new()?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(|e| RagError::Pipeline(format!("upload spooling failed: {e}")))??;

        let now = Utc::now();
        let record = DocumentRecord {
            document_id: document_id.clone(),
            filename: request.filename,
            title: request.title.clone(),
            description: request.description,
            tags: request.tags,
            file_size,
            file_type,
            chunk_count: 0,
            user_id: principal.user_id.clone(),
            status: DocumentStatus::Processing,
            created_at: now,
            updated_at: now,
        };
        self.inner.metadata_store.insert(record).await?;

        let job = IngestJob {
            document_id: document_id.clone(),
            temp_file,
            file_type,
            title: request.title,
            user_id: principal.user_id.clone(),
        };
        self.inner.jobs.set(&document_id, JobStatus::Queued).await;

        if self.queue.send(job).await.is_err() {
            // Worker pool has shut down; the upload can never complete.
            let update = DocumentUpdate::status(DocumentStatus::Failed);
            if let Err(e) = self.inner.metadata_store.update(&document_id, update).await {
                error!(document_id = %document_id, error = %e, "failed to record queue failure");
            }
            self.inner.jobs.set(&document_id, JobStatus::Failed("queue closed".into())).await;
            return Err(RagError::Pipeline("ingestion queue is closed".to_string()));
        }

        info!(
            document_id = %document_id,
            file_type = %file_type,
            file_size,
            user_id = %principal.user_id,
            "accepted upload"
        );
        Ok(document_id)
    }

    /// The current status of a document's ingestion job, or `None` for an
    /// id this pipeline has never accepted.
    pub async fn job_status(&self, document_id: &str) -> Option<JobStatus> {
        self.inner.jobs.get(document_id).await
    }

    /// Acquire the per-document write lock shared with the worker pool.
    pub(crate) async fn lock_document(&self, document_id: &str) -> OwnedMutexGuard<()> {
        self.inner.locks.acquire(document_id).await
    }
}

impl PipelineInner {
    async fn run_job(&self, job: IngestJob) {
        let document_id = job.document_id.clone();
        // Hold the document lock across all stages so a concurrent delete
        // cannot interleave with the index and metadata writes.
        let _guard = self.locks.acquire(&document_id).await;

        match self.process(job).await {
            Ok(chunk_count) => {
                info!(document_id = %document_id, chunk_count, "ingested document");
                self.jobs.set(&document_id, JobStatus::Succeeded).await;
            }
            Err(e) => {
                error!(document_id = %document_id, error = %e, "ingestion failed");
                self.jobs.set(&document_id, JobStatus::Failed(e.to_string())).await;
                let update = DocumentUpdate::status(DocumentStatus::Failed);
                if let Err(update_err) = self.metadata_store.update(&document_id, update).await {
                    error!(
                        document_id = %document_id,
                        error = %update_err,
                        "failed to record ingestion failure"
                    );
                }
            }
        }
    }

    /// Run the stages for one document: load → chunk → embed → index →
    /// persist. Stage order is fixed; any error aborts the document with
    /// nothing indexed.
    async fn process(&self, job: IngestJob) -> Result<usize> {
        let IngestJob { document_id, temp_file, file_type, title, user_id } = job;

        self.jobs.set_stage(&document_id, Stage::Loading).await;
        let bytes = tokio::fs::read(temp_file.path()).await?;
        let text = Loader::for_file_type(file_type).load(bytes).await?;
        // Text extracted; release the temp file before the slow stages.
        drop(temp_file);

        self.jobs.set_stage(&document_id, Stage::Chunking).await;
        let base_metadata = std::collections::HashMap::from([
            ("document_id".to_string(), document_id.clone()),
            ("user_id".to_string(), user_id),
            ("title".to_string(), title),
            ("source".to_string(), "upload".to_string()),
        ]);
        let mut chunks = self.chunker.chunk(&document_id, &text, &base_metadata);

        if chunks.is_empty() {
            self.jobs.set_stage(&document_id, Stage::Persisting).await;
            self.metadata_store.update(&document_id, DocumentUpdate::completed(0)).await?;
            return Ok(0);
        }

        // Embed every batch before indexing anything: a failing batch must
        // leave zero chunks of this document in the store.
        self.jobs.set_stage(&document_id, Stage::Embedding).await;
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.config.embed_batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = self.embed_with_retry(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(RagError::Pipeline(format!(
                    "embedder returned {} vectors for {} inputs",
                    vectors.len(),
                    texts.len()
                )));
            }
            embeddings.extend(vectors);
        }
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        self.jobs.set_stage(&document_id, Stage::Indexing).await;
        self.vector_store.upsert(&chunks).await?;

        self.jobs.set_stage(&document_id, Stage::Persisting).await;
        let chunk_count = chunks.len();
        self.metadata_store.update(&document_id, DocumentUpdate::completed(chunk_count)).await?;

        Ok(chunk_count)
    }

    async fn embed_with_retry(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            match self.embedding_provider.embed_batch(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_retryable() && attempt < self.config.embed_max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "retrying embedding batch");
                    tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn worker_loop(inner: Arc<PipelineInner>, queue: Arc<Mutex<mpsc::Receiver<IngestJob>>>) {
    loop {
        let job = { queue.lock().await.recv().await };
        match job {
            Some(job) => inner.run_job(job).await,
            None => break,
        }
    }
}

/// Builder for constructing an [`IngestPipeline`].
///
/// `embedding_provider`, `vector_store`, and `metadata_store` are required.
/// `config` defaults to [`RagConfig::default()`]; `chunker` defaults to a
/// [`SemanticChunker`] with the config's chunk size and overlap.
///
/// [`build()`](IngestPipelineBuilder::build) spawns the worker pool, so it
/// must be called within a Tokio runtime.
#[derive(Default)]
pub struct IngestPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    metadata_store: Option<Arc<dyn MetadataStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl IngestPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the metadata store backend.
    pub fn metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata_store = Some(store);
        self
    }

    /// Set the document chunker, overriding the config-derived default.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`IngestPipeline`] and spawn its worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing.
    pub fn build(self) -> Result<IngestPipeline> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let metadata_store = self
            .metadata_store
            .ok_or_else(|| RagError::Config("metadata_store is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(SemanticChunker::new(config.chunk_size, config.chunk_overlap))
        });

        let inner = Arc::new(PipelineInner {
            config,
            embedding_provider,
            vector_store,
            metadata_store,
            chunker,
            jobs: JobTracker::default(),
            locks: DocumentLocks::default(),
        });

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));
        for _ in 0..inner.config.workers {
            tokio::spawn(worker_loop(inner.clone(), rx.clone()));
        }

        Ok(IngestPipeline { inner, queue: tx })
    }
}
