//! In-process index used by unit tests.

use crate::models::{BulkOutcome, Document, IndexBatch, RejectedDocument, SearchHit};
use crate::query::MatchQuery;
use crate::traits::DocumentIndex;
use crate::SearchError;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct FakeIndex {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    documents: Vec<Document>,
    visible: usize,
    refresh_intervals: Vec<String>,
    fail_settings: bool,
    unavailable: bool,
    rejected_titles: Vec<String>,
    transient_bulk_failures: u32,
    bulk_delay: Option<Duration>,
    bulk_calls: usize,
    refresh_calls: usize,
    search_calls: usize,
}

impl FakeIndex {
    pub(crate) fn fail_settings(&self, fail: bool) {
        self.state.lock().unwrap().fail_settings = fail;
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    pub(crate) fn reject_title(&self, title: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected_titles
            .push(title.to_string());
    }

    pub(crate) fn fail_next_bulks(&self, count: u32) {
        self.state.lock().unwrap().transient_bulk_failures = count;
    }

    pub(crate) fn delay_bulk(&self, delay: Duration) {
        self.state.lock().unwrap().bulk_delay = Some(delay);
    }

    pub(crate) fn refresh_intervals(&self) -> Vec<String> {
        self.state.lock().unwrap().refresh_intervals.clone()
    }

    pub(crate) fn documents(&self) -> Vec<Document> {
        self.state.lock().unwrap().documents.clone()
    }

    pub(crate) fn bulk_calls(&self) -> usize {
        self.state.lock().unwrap().bulk_calls
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.state.lock().unwrap().refresh_calls
    }

    pub(crate) fn search_calls(&self) -> usize {
        self.state.lock().unwrap().search_calls
    }

    fn check_available(&self) -> Result<(), SearchError> {
        if self.state.lock().unwrap().unavailable {
            return Err(SearchError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentIndex for FakeIndex {
    async fn ping(&self) -> Result<(), SearchError> {
        self.check_available()
    }

    async fn ensure_index(&self) -> Result<(), SearchError> {
        self.check_available()
    }

    async fn put_refresh_interval(&self, interval: &str) -> Result<(), SearchError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        if state.fail_settings {
            return Err(SearchError::Request("settings rejected".to_string()));
        }
        state.refresh_intervals.push(interval.to_string());
        Ok(())
    }

    async fn bulk_index(&self, batch: &IndexBatch) -> Result<BulkOutcome, SearchError> {
        self.check_available()?;
        let delay = self.state.lock().unwrap().bulk_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.bulk_calls += 1;
        if state.transient_bulk_failures > 0 {
            state.transient_bulk_failures -= 1;
            return Err(SearchError::Unavailable("bulk connection reset".to_string()));
        }

        let mut outcome = BulkOutcome::default();
        for document in batch.documents() {
            if state.rejected_titles.contains(&document.title) {
                outcome.rejected.push(RejectedDocument {
                    title: document.title.clone(),
                    reason: "mapper_parsing_exception (400)".to_string(),
                });
            } else {
                state.documents.push(document.clone());
                outcome.indexed.push(document.title.clone());
            }
        }
        Ok(outcome)
    }

    async fn refresh(&self) -> Result<(), SearchError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        state.refresh_calls += 1;
        state.visible = state.documents.len();
        Ok(())
    }

    async fn search(&self, query: &MatchQuery) -> Result<Vec<SearchHit>, SearchError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        state.search_calls += 1;

        let terms = query
            .text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>();
        Ok(state.documents[..state.visible]
            .iter()
            .filter(|document| {
                let content = document.content.to_lowercase();
                terms.iter().all(|term| content.contains(term.as_str()))
            })
            .take(query.size)
            .map(|document| SearchHit {
                title: document.title.clone(),
                content: document.content.clone(),
            })
            .collect())
    }
}
