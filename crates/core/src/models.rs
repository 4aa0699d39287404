use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One uploaded file as handed over by the transport.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub content: String,
}

/// Pending index operations for a single ingestion request.
#[derive(Debug, Clone)]
pub struct IndexBatch {
    batch_id: Uuid,
    documents: Vec<Document>,
}

impl Default for IndexBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBatch {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            documents: Vec::new(),
        }
    }

    /// Store id of the document at `position`; stable across resubmissions of this batch.
    pub fn document_id(&self, position: usize) -> String {
        format!("{}-{position}", self.batch_id)
    }

    /// Queues a document. Blank content is refused so nothing empty reaches the store.
    pub fn push(&mut self, document: Document) -> bool {
        if document.content.trim().is_empty() {
            return false;
        }
        self.documents.push(document);
        true
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn titles(&self) -> Vec<String> {
        self.documents
            .iter()
            .map(|document| document.title.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Excerpt {
    pub title: String,
    pub highlighted_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedUpload {
    pub title: String,
    pub reason: String,
}

/// An indexed upload that had pages without any text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartialExtraction {
    pub title: String,
    pub missing_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectedDocument {
    pub title: String,
    pub reason: String,
}

/// Per-item result of one bulk submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkOutcome {
    pub indexed: Vec<String>,
    pub rejected: Vec<RejectedDocument>,
}

impl BulkOutcome {
    /// Marks every document of the batch as rejected for the same reason.
    pub fn all_rejected(batch: &IndexBatch, reason: &str) -> Self {
        Self {
            indexed: Vec::new(),
            rejected: batch
                .titles()
                .into_iter()
                .map(|title| RejectedDocument {
                    title,
                    reason: reason.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub request_id: Uuid,
    /// Uploads whose extracted text was non-empty.
    pub indexed_count: usize,
    pub skipped: Vec<SkippedUpload>,
    pub partial: Vec<PartialExtraction>,
    pub rejected: Vec<RejectedDocument>,
    pub cancelled: Vec<String>,
}

impl IngestionReport {
    pub fn message(&self) -> String {
        format!("{} files uploaded successfully", self.indexed_count)
    }

    pub fn skipped_titles(&self) -> Vec<String> {
        self.skipped.iter().map(|item| item.title.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub max_parallel_extractions: usize,
    pub bulk_timeout: Duration,
    pub bulk_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            max_parallel_extractions: std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(4),
            bulk_timeout: Duration::from_secs(30),
            bulk_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_refuses_blank_documents() {
        let mut batch = IndexBatch::new();
        assert!(!batch.push(Document {
            title: "blank.pdf".to_string(),
            content: " \n\t".to_string(),
        }));
        assert!(batch.push(Document {
            title: "a.pdf".to_string(),
            content: "Some text.".to_string(),
        }));
        assert_eq!(batch.titles(), vec!["a.pdf".to_string()]);
    }

    #[test]
    fn document_ids_are_scoped_to_the_batch() {
        let id = Uuid::new_v4();
        let batch = IndexBatch::with_id(id);
        assert_eq!(batch.document_id(0), format!("{id}-0"));
        assert_ne!(IndexBatch::new().document_id(0), batch.document_id(0));
    }

    #[test]
    fn report_message_counts_indexed_uploads() {
        let report = IngestionReport {
            request_id: Uuid::new_v4(),
            indexed_count: 2,
            skipped: vec![SkippedUpload {
                title: "scan.pdf".to_string(),
                reason: "no text".to_string(),
            }],
            partial: Vec::new(),
            rejected: Vec::new(),
            cancelled: Vec::new(),
        };

        assert_eq!(report.message(), "2 files uploaded successfully");
        assert_eq!(report.skipped_titles(), vec!["scan.pdf".to_string()]);
    }
}
