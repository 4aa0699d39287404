use crate::models::{BulkOutcome, IndexBatch, SearchHit};
use crate::query::MatchQuery;
use crate::SearchError;
use async_trait::async_trait;

/// Refresh interval value that turns periodic refresh off.
pub const REFRESH_DISABLED: &str = "-1";

/// The full-text store documents are loaded into and searched from.
#[async_trait]
pub trait DocumentIndex {
    async fn ping(&self) -> Result<(), SearchError>;

    async fn ensure_index(&self) -> Result<(), SearchError>;

    async fn put_refresh_interval(&self, interval: &str) -> Result<(), SearchError>;

    /// Items succeed or fail independently; per-item failures land in the outcome.
    async fn bulk_index(&self, batch: &IndexBatch) -> Result<BulkOutcome, SearchError>;

    async fn refresh(&self) -> Result<(), SearchError>;

    async fn search(&self, query: &MatchQuery) -> Result<Vec<SearchHit>, SearchError>;
}
