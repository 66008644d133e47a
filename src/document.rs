//! Data types for documents, chunks, search results, and principals.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The declared type of an uploaded file, derived from its extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// A PDF document.
    Pdf,
    /// A Word document (`.docx` or legacy `.doc`).
    Docx,
    /// Plain text, markdown, or reStructuredText.
    Text,
    /// Anything else; loaded with the plain-text fallback.
    Unknown,
}

impl FileType {
    /// Derive the file type from a filename's extension.
    ///
    /// `.pdf` → [`Pdf`](FileType::Pdf); `.docx`/`.doc` → [`Docx`](FileType::Docx);
    /// `.txt`/`.md`/`.rst` → [`Text`](FileType::Text); everything else →
    /// [`Unknown`](FileType::Unknown).
    pub fn from_filename(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("pdf") => FileType::Pdf,
            Some("docx") | Some("doc") => FileType::Docx,
            Some("txt") | Some("md") | Some("rst") => FileType::Text,
            _ => FileType::Unknown,
        }
    }

    /// A lowercase name for logging and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Text => "text",
            FileType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of a document's ingestion.
///
/// The metadata record is created with [`Processing`](DocumentStatus::Processing)
/// when the upload is accepted, and moves to a terminal state when the
/// background pipeline finishes. This is what lets callers distinguish
/// "still processing" from "failed" from "never submitted" (not found).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Background ingestion has been queued or is running.
    Processing,
    /// Ingestion completed; `chunk_count` reflects the indexed chunks.
    Ready,
    /// Ingestion failed; no chunks for this document are indexed.
    Failed,
}

/// The durable metadata record for an uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    /// Opaque unique identifier, assigned at upload time.
    pub document_id: String,
    /// Original filename of the upload.
    pub filename: String,
    /// Caller-supplied title.
    pub title: String,
    /// Optional caller-supplied description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Caller-supplied tags, order preserved.
    pub tags: Vec<String>,
    /// Size of the uploaded file in bytes.
    pub file_size: u64,
    /// Declared file type, derived from the filename.
    pub file_type: FileType,
    /// Number of chunks indexed for this document. Zero until ingestion
    /// completes.
    pub chunk_count: usize,
    /// Owning user. Only the owner (or a privileged principal) may delete.
    pub user_id: String,
    /// Current ingestion status.
    pub status: DocumentStatus,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

/// A segment of a document's text with its vector embedding.
///
/// Chunk ids are `{document_id}-{index}` with a sequential index in the
/// chunker's traversal order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text. Empty until the
    /// pipeline attaches one.
    pub embedding: Vec<f32>,
    /// Key-value metadata: `document_id`, `chunk_id`, `user_id`, `title`,
    /// `source`.
    pub metadata: HashMap<String, String>,
    /// The id of the parent document.
    pub document_id: String,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity; higher is more relevant, for every backend.
    pub score: f32,
}

/// The authenticated caller, resolved by the auth layer outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    /// The caller's user id; stamped onto every chunk the caller uploads.
    pub user_id: String,
    /// Privileged principals may delete documents they do not own.
    pub is_privileged: bool,
}

impl Principal {
    /// A regular, non-privileged principal.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), is_privileged: false }
    }

    /// A privileged principal.
    pub fn privileged(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), is_privileged: true }
    }
}

/// An upload request: raw file bytes plus caller-supplied metadata.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// The raw file contents.
    pub file_bytes: Vec<u8>,
    /// The original filename; its extension selects the loader.
    pub filename: String,
    /// Required title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Tags, order preserved.
    pub tags: Vec<String>,
}
