use crate::cancellation::CancellationToken;
use crate::extractor::{Extraction, TextExtractor};
use crate::models::{
    BulkOutcome, Document, IndexBatch, IngestionOptions, IngestionReport, PartialExtraction,
    SkippedUpload, Upload,
};
use crate::refresh::RefreshWindow;
use crate::traits::DocumentIndex;
use crate::{IngestError, SearchError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Extracts uploads and loads them into the index as one bulk batch per request.
pub struct IngestionPipeline<S: ?Sized> {
    store: Arc<S>,
    extractor: Arc<TextExtractor>,
    refresh: Arc<RefreshWindow>,
    options: IngestionOptions,
}

impl<S> IngestionPipeline<S>
where
    S: DocumentIndex + Send + Sync + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        extractor: Arc<TextExtractor>,
        refresh: Arc<RefreshWindow>,
        options: IngestionOptions,
    ) -> Self {
        Self {
            store,
            extractor,
            refresh,
            options,
        }
    }

    /// Only an unreachable store or a nameless upload fails the whole call;
    /// everything else ends up in the report.
    pub async fn ingest(
        &self,
        uploads: Vec<Upload>,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport, IngestError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("ingest", %request_id, uploads = uploads.len());
        self.ingest_inner(request_id, uploads, cancel)
            .instrument(span)
            .await
    }

    async fn ingest_inner(
        &self,
        request_id: Uuid,
        uploads: Vec<Upload>,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport, IngestError> {
        let uploads = uploads
            .into_iter()
            .map(|upload| Ok((upload_title(&upload)?, upload)))
            .collect::<Result<Vec<_>, IngestError>>()?;

        if !uploads.is_empty() {
            self.store.ensure_index().await?;
        }

        let semaphore = Arc::new(Semaphore::new(self.options.max_parallel_extractions.max(1)));
        let mut pending: Vec<(String, JoinHandle<Extraction>)> = Vec::new();
        let mut skipped = Vec::new();
        let mut cancelled = Vec::new();

        let mut remaining = uploads.into_iter();
        while let Some((title, upload)) = remaining.next() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|error| IngestError::Task(error.to_string()))?;

            if cancel.is_cancelled() {
                cancelled.push(title);
                cancelled.extend(remaining.by_ref().map(|(title, _)| title));
                warn!(cancelled = cancelled.len(), "ingestion cancelled, remaining files dropped");
                break;
            }

            let staged = match stage_upload(&upload) {
                Ok(staged) => staged,
                Err(error) => {
                    warn!(title = %title, error = %error, "could not stage upload");
                    skipped.push(SkippedUpload {
                        title,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            let extractor = self.extractor.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                // Dropping `staged` deletes the temp file, whether or not extraction succeeded.
                extractor.extract(staged.path())
            });
            pending.push((title, handle));
        }

        let mut batch = IndexBatch::with_id(request_id);
        let mut partial = Vec::new();
        for (title, handle) in pending {
            match handle.await {
                Ok(extraction) if !extraction.is_empty() => {
                    info!(
                        title = %title,
                        method = ?extraction.method,
                        strategy = extraction.strategy.unwrap_or_default(),
                        missing_pages = extraction.missing_pages,
                        "text extracted"
                    );
                    if extraction.missing_pages > 0 {
                        partial.push(PartialExtraction {
                            title: title.clone(),
                            missing_pages: extraction.missing_pages,
                        });
                    }
                    batch.push(Document {
                        title,
                        content: extraction.text,
                    });
                }
                Ok(extraction) => {
                    warn!(title = %title, reason = %extraction.skip_reason(), "upload skipped");
                    skipped.push(SkippedUpload {
                        title,
                        reason: extraction.skip_reason(),
                    });
                }
                Err(join_error) => {
                    let reason = IngestError::Task(join_error.to_string()).to_string();
                    warn!(title = %title, reason = %reason, "upload skipped");
                    skipped.push(SkippedUpload { title, reason });
                }
            }
        }

        let indexed_count = batch.len();
        let rejected = if batch.is_empty() {
            Vec::new()
        } else {
            self.refresh.suspend(self.store.as_ref()).await;
            let outcome = self.submit(&batch).await;

            if let Err(error) = self.store.refresh().await {
                warn!(error = %error, "explicit refresh after bulk load failed");
            }

            outcome.rejected
        };

        info!(
            indexed = indexed_count,
            skipped = skipped.len(),
            rejected = rejected.len(),
            cancelled = cancelled.len(),
            "ingestion finished"
        );

        Ok(IngestionReport {
            request_id,
            indexed_count,
            skipped,
            partial,
            rejected,
            cancelled,
        })
    }

    /// Bulk submission under a deadline, retrying transport failures.
    async fn submit(&self, batch: &IndexBatch) -> BulkOutcome {
        let attempts = self.options.bulk_attempts.max(1);
        let mut attempt = 0;

        let last_error = loop {
            attempt += 1;
            let result =
                match tokio::time::timeout(self.options.bulk_timeout, self.store.bulk_index(batch))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(SearchError::Timeout(self.options.bulk_timeout)),
                };

            match result {
                Ok(outcome) => {
                    for rejected in &outcome.rejected {
                        warn!(title = %rejected.title, reason = %rejected.reason, "document rejected by index");
                    }
                    return outcome;
                }
                Err(error) if error.is_retryable() && attempt < attempts => {
                    warn!(attempt, error = %error, "bulk submission failed, retrying");
                    tokio::time::sleep(self.options.retry_backoff * attempt).await;
                }
                Err(error) => break error,
            }
        };

        error!(attempts = attempt, error = %last_error, "bulk submission failed");
        BulkOutcome::all_rejected(batch, &last_error.to_string())
    }
}

fn upload_title(upload: &Upload) -> Result<String, IngestError> {
    Path::new(upload.file_name.trim())
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::MissingFileName(upload.file_name.clone()))
}

/// Writes the upload to a temp file that is removed when the handle drops.
fn stage_upload(upload: &Upload) -> Result<NamedTempFile, IngestError> {
    let suffix = Path::new(&upload.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    let mut staged = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile()?;
    staged.write_all(&upload.bytes)?;
    staged.flush()?;
    Ok(staged)
}
