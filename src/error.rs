//! Error types for the `docrag` crate.

use thiserror::Error;

/// Errors that can occur in ingestion and retrieval operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A malformed request, rejected before any pipeline work starts.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A file could not be parsed for its declared type.
    #[error("Load error ({file_type}): {message}")]
    Load {
        /// The file type the loader was asked to parse.
        file_type: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether retrying the same request may succeed (rate limits,
        /// transient backend failures).
        retryable: bool,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Lookup or delete of an unknown document.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Insert of a document id that already has a metadata record.
    #[error("Duplicate document: {0}")]
    DuplicateDocument(String),

    /// Delete or update attempted by a non-owner, non-privileged principal.
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Metadata store and vector index disagree about a document.
    ///
    /// Raised by reconciliation, never by the normal ingest/query flow.
    #[error("Inconsistency detected: {0}")]
    Inconsistency(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error in pipeline orchestration.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// An I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Whether the operation that produced this error may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::Embedding { retryable: true, .. })
    }
}

/// A convenience result type for docrag operations.
pub type Result<T> = std::result::Result<T, RagError>;
