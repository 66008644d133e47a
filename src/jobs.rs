//! Background job tracking for the ingestion worker pool.
//!
//! The pipeline enqueues one [`IngestJob`] per upload; a pool of workers
//! consumes them. Job state is tracked per document id so callers can
//! distinguish queued, running, succeeded, and failed ingestions without
//! inferring state from metadata-store absence.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::document::FileType;

/// The pipeline stage a running ingestion is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Parsing the uploaded file into plain text.
    Loading,
    /// Splitting the text into chunks.
    Chunking,
    /// Generating embeddings for the chunks.
    Embedding,
    /// Upserting chunks into the vector store.
    Indexing,
    /// Writing the final metadata record.
    Persisting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Loading => "loading",
            Stage::Chunking => "chunking",
            Stage::Embedding => "embedding",
            Stage::Indexing => "indexing",
            Stage::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// The observable state of an ingestion job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "detail")]
pub enum JobStatus {
    /// Accepted, waiting for a worker.
    Queued,
    /// A worker is executing the given stage.
    Running(Stage),
    /// All stages completed; the document is searchable.
    Succeeded,
    /// A stage failed; the message describes the cause.
    Failed(String),
}

/// An enqueued ingestion job.
///
/// Owns the scoped temporary file; dropping the job on any path deletes it.
pub(crate) struct IngestJob {
    pub document_id: String,
    pub temp_file: NamedTempFile,
    pub file_type: FileType,
    pub title: String,
    pub user_id: String,
}

/// Shared per-document job status map.
#[derive(Clone, Default)]
pub(crate) struct JobTracker {
    statuses: Arc<RwLock<HashMap<String, JobStatus>>>,
}

impl JobTracker {
    pub async fn set(&self, document_id: &str, status: JobStatus) {
        let mut statuses = self.statuses.write().await;
        statuses.insert(document_id.to_string(), status);
    }

    pub async fn set_stage(&self, document_id: &str, stage: Stage) {
        self.set(document_id, JobStatus::Running(stage)).await;
    }

    pub async fn get(&self, document_id: &str) -> Option<JobStatus> {
        let statuses = self.statuses.read().await;
        statuses.get(document_id).cloned()
    }
}

/// Per-document-id async locks.
///
/// Writes touching one document (ingestion stages, delete) serialize on the
/// document's lock so chunk_count and the index never diverge through
/// interleaving. Lock entries are tiny and never reclaimed; the map grows
/// with the number of distinct documents seen by this process.
#[derive(Default)]
pub(crate) struct DocumentLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DocumentLocks {
    pub async fn acquire(&self, document_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(document_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn tracker_reports_latest_status() {
        let tracker = JobTracker::default();
        assert_eq!(tracker.get("d-1").await, None);

        tracker.set("d-1", JobStatus::Queued).await;
        tracker.set_stage("d-1", Stage::Embedding).await;
        assert_eq!(tracker.get("d-1").await, Some(JobStatus::Running(Stage::Embedding)));

        tracker.set("d-1", JobStatus::Succeeded).await;
        assert_eq!(tracker.get("d-1").await, Some(JobStatus::Succeeded));
    }

    #[tokio::test]
    async fn document_locks_serialize_same_id() {
        let locks = Arc::new(DocumentLocks::default());
        let guard = locks.acquire("d-1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("d-1").await })
        };
        // Same id blocks while the guard is held.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // A different id does not block.
        let _other = locks.acquire("d-2").await;

        drop(guard);
        contender.await.unwrap();
    }
}
