//! # docrag
//!
//! Document ingestion and retrieval: upload a file, have it chunked,
//! embedded, and indexed in the background, then answer natural-language
//! queries by similarity search over the indexed chunks, isolated per user.
//!
//! ## Architecture
//!
//! - [`Chunker`] — splits text into overlapping chunks, preferring
//!   paragraph/sentence/word boundaries ([`SemanticChunker`])
//! - [`EmbeddingProvider`] — turns text into fixed-dimension vectors
//!   ([`OpenAiEmbedder`] for OpenAI-compatible APIs)
//! - [`VectorStore`] — filtered similarity search over chunks
//!   ([`InMemoryVectorStore`]; Qdrant behind the `qdrant` feature)
//! - [`MetadataStore`] — durable per-document records with ingestion status
//! - [`IngestPipeline`] — upload intake plus a background worker pool
//!   running load → chunk → embed → index → persist
//! - [`KnowledgeService`] — search, lookup, owner-checked delete, and
//!   metadata/index reconciliation
//!
//! Scores are cosine similarity, higher is better, for every backend.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docrag::{
//!     IngestPipeline, InMemoryMetadataStore, InMemoryVectorStore, KnowledgeService,
//!     OpenAiEmbedder, Principal, RagConfig, UploadRequest,
//! };
//!
//! let pipeline = IngestPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(OpenAiEmbedder::from_env()?))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .metadata_store(Arc::new(InMemoryMetadataStore::new()))
//!     .build()?;
//! let service = KnowledgeService::new(pipeline);
//!
//! let principal = Principal::user("user-1");
//! let document_id = service
//!     .upload(
//!         UploadRequest {
//!             file_bytes: std::fs::read("notes.md")?,
//!             filename: "notes.md".into(),
//!             title: "Notes".into(),
//!             description: None,
//!             tags: vec![],
//!         },
//!         &principal,
//!     )
//!     .await?;
//!
//! // Processing is asynchronous; poll the record until it is Ready.
//! let record = service.get(&document_id).await?;
//! let results = service.search("what did I write?", &Default::default(), None, Some("user-1")).await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod jobs;
pub mod loader;
pub mod metadata;
pub mod openai;
pub mod pipeline;
#[cfg(feature = "qdrant")]
pub mod qdrant;
pub mod service;
pub mod vectorstore;

pub use chunking::{Chunker, FixedSizeChunker, SemanticChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Chunk, DocumentRecord, DocumentStatus, FileType, Principal, SearchResult, UploadRequest,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use inmemory::InMemoryVectorStore;
pub use jobs::{JobStatus, Stage};
pub use loader::Loader;
pub use metadata::{DocumentUpdate, InMemoryMetadataStore, MetadataStore};
pub use openai::OpenAiEmbedder;
pub use pipeline::{IngestPipeline, IngestPipelineBuilder};
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
pub use service::{Inconsistency, KnowledgeService};
pub use vectorstore::{MetadataFilter, VectorStore};
