pub mod cancellation;
pub mod error;
pub mod extractor;
pub mod highlight;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod refresh;
pub mod segmenter;
pub mod stores;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use cancellation::{CancellationHandle, CancellationToken};
pub use error::{IngestError, SearchError};
pub use extractor::{
    EndpointOcrStrategy, Extraction, ExtractionMethod, NativePdfStrategy, OcrEndpointConfig,
    StrategyOutput, TesseractConfig, TesseractOcrStrategy, TextExtractor, TextStrategy,
};
pub use highlight::{highlight, MatchPolicy};
pub use ingest::{discover_pdf_files, IngestionPipeline};
pub use models::{
    BulkOutcome, Document, Excerpt, IndexBatch, IngestionOptions, IngestionReport,
    PartialExtraction, RejectedDocument, SearchHit, SkippedUpload, Upload,
};
pub use orchestrator::SearchCoordinator;
pub use query::{auto_fuzziness, build_match_query, MatchQuery, DEFAULT_SEARCH_SIZE};
pub use refresh::{RefreshWindow, RestoreOutcome};
pub use segmenter::{segment_sentences, Sentences};
pub use stores::OpenSearchStore;
pub use traits::{DocumentIndex, REFRESH_DISABLED};
