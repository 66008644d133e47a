//! Metadata store: durable document-level records keyed by document id.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::document::{DocumentRecord, DocumentStatus};
use crate::error::{RagError, Result};

/// A partial update with merge semantics.
///
/// Provided fields overwrite the stored record; absent fields are left
/// untouched. `updated_at` is always refreshed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentUpdate {
    /// New ingestion status.
    pub status: Option<DocumentStatus>,
    /// New chunk count.
    pub chunk_count: Option<usize>,
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New tag list (replaces, not appends).
    pub tags: Option<Vec<String>>,
}

impl DocumentUpdate {
    /// An update that only changes the status.
    pub fn status(status: DocumentStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    /// An update marking ingestion complete with its final chunk count.
    pub fn completed(chunk_count: usize) -> Self {
        Self {
            status: Some(DocumentStatus::Ready),
            chunk_count: Some(chunk_count),
            ..Self::default()
        }
    }
}

/// A keyed record store over `document_id`.
///
/// Point lookups return `None` for unknown ids, never a default record.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DuplicateDocument`] when a record with the same
    /// `document_id` already exists.
    async fn insert(&self, record: DocumentRecord) -> Result<()>;

    /// Look up a record by document id.
    async fn get(&self, document_id: &str) -> Result<Option<DocumentRecord>>;

    /// Apply a merge update to an existing record, refreshing `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] when the id has no record.
    async fn update(&self, document_id: &str, update: DocumentUpdate) -> Result<()>;

    /// Delete a record by document id.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] when the id has no record.
    async fn delete(&self, document_id: &str) -> Result<()>;

    /// All records, for reconciliation.
    async fn list(&self) -> Result<Vec<DocumentRecord>>;
}

/// An in-memory [`MetadataStore`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    records: RwLock<HashMap<String, DocumentRecord>>,
}

impl InMemoryMetadataStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn insert(&self, record: DocumentRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.document_id) {
            return Err(RagError::DuplicateDocument(record.document_id));
        }
        records.insert(record.document_id.clone(), record);
        Ok(())
    }

    async fn get(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        let records = self.records.read().await;
        Ok(records.get(document_id).cloned())
    }

    async fn update(&self, document_id: &str, update: DocumentUpdate) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(document_id)
            .ok_or_else(|| RagError::NotFound(document_id.to_string()))?;

        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(chunk_count) = update.chunk_count {
            record.chunk_count = chunk_count;
        }
        if let Some(title) = update.title {
            record.title = title;
        }
        if let Some(description) = update.description {
            record.description = Some(description);
        }
        if let Some(tags) = update.tags {
            record.tags = tags;
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, document_id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records
            .remove(document_id)
            .map(|_| ())
            .ok_or_else(|| RagError::NotFound(document_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<DocumentRecord>> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FileType;

    fn record(id: &str) -> DocumentRecord {
        let now = Utc::now();
        DocumentRecord {
            document_id: id.to_string(),
            filename: "notes.txt".to_string(),
            title: "Notes".to_string(),
            description: None,
            tags: vec!["tag1".to_string()],
            file_size: 42,
            file_type: FileType::Text,
            chunk_count: 0,
            user_id: "alice".to_string(),
            status: DocumentStatus::Processing,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_id() {
        let store = InMemoryMetadataStore::new();
        store.insert(record("d-1")).await.unwrap();
        let err = store.insert(record("d-1")).await.unwrap_err();
        assert!(matches!(err, RagError::DuplicateDocument(_)));
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = InMemoryMetadataStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_and_refreshes_updated_at() {
        let store = InMemoryMetadataStore::new();
        store.insert(record("d-1")).await.unwrap();
        let before = store.get("d-1").await.unwrap().unwrap();

        store.update("d-1", DocumentUpdate::completed(7)).await.unwrap();

        let after = store.get("d-1").await.unwrap().unwrap();
        assert_eq!(after.status, DocumentStatus::Ready);
        assert_eq!(after.chunk_count, 7);
        // Untouched fields survive the merge.
        assert_eq!(after.title, before.title);
        assert_eq!(after.tags, before.tags);
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn update_and_delete_missing_return_not_found() {
        let store = InMemoryMetadataStore::new();
        let err = store.update("nope", DocumentUpdate::default()).await.unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
        let err = store.delete("nope").await.unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }
}
