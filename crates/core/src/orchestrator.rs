use crate::highlight::{highlight, MatchPolicy};
use crate::models::Excerpt;
use crate::query::build_match_query;
use crate::traits::DocumentIndex;
use crate::SearchError;
use std::sync::Arc;
use tracing::debug;

pub struct SearchCoordinator<S: ?Sized> {
    store: Arc<S>,
    policy: MatchPolicy,
}

impl<S> SearchCoordinator<S>
where
    S: DocumentIndex + Send + Sync + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Matching sentences in store rank order. A blank query never reaches the store.
    pub async fn search(&self, query: &str, size: usize) -> Result<Vec<Excerpt>, SearchError> {
        let Some(match_query) = build_match_query(query, size) else {
            return Ok(Vec::new());
        };

        let hits = self.store.search(&match_query).await?;
        let excerpts = highlight(&hits, query, self.policy);
        debug!(
            query = %query,
            hits = hits.len(),
            excerpts = excerpts.len(),
            "search finished"
        );

        Ok(excerpts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, IndexBatch};
    use crate::testing::FakeIndex;

    async fn seeded_store(documents: &[(&str, &str)]) -> Result<Arc<FakeIndex>, SearchError> {
        let store = Arc::new(FakeIndex::default());
        let mut batch = IndexBatch::new();
        for (title, content) in documents {
            batch.push(Document {
                title: title.to_string(),
                content: content.to_string(),
            });
        }
        store.bulk_index(&batch).await?;
        store.refresh().await?;
        Ok(store)
    }

    #[tokio::test]
    async fn blank_query_does_not_contact_the_store() -> Result<(), SearchError> {
        let store = seeded_store(&[("pets.pdf", "The cat sat. The dog ran fast.")]).await?;
        let coordinator = SearchCoordinator::new(store.clone());

        assert!(coordinator.search("", 100).await?.is_empty());
        assert!(coordinator.search("   ", 100).await?.is_empty());
        assert_eq!(store.search_calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn matching_sentence_is_returned_with_its_title() -> Result<(), SearchError> {
        let store = seeded_store(&[("pets.pdf", "The cat sat. The dog ran fast.")]).await?;
        let coordinator = SearchCoordinator::new(store.clone());

        let excerpts = coordinator.search("dog", 100).await?;

        assert_eq!(
            excerpts,
            vec![Excerpt {
                title: "pets.pdf".to_string(),
                highlighted_text: "The dog ran fast.".to_string(),
            }]
        );
        assert_eq!(store.search_calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn size_caps_the_hits_considered() -> Result<(), SearchError> {
        let store = seeded_store(&[
            ("a.pdf", "Pumps leak."),
            ("b.pdf", "Pumps rattle."),
            ("c.pdf", "Pumps hum."),
        ])
        .await?;
        let coordinator = SearchCoordinator::new(store);

        let excerpts = coordinator.search("pumps", 2).await?;

        assert_eq!(excerpts.len(), 2);
        assert_eq!(excerpts[0].title, "a.pdf");
        assert_eq!(excerpts[1].title, "b.pdf");
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_store_surfaces_as_an_error() -> Result<(), SearchError> {
        let store = seeded_store(&[("a.pdf", "Pumps leak.")]).await?;
        store.set_unavailable(true);
        let coordinator = SearchCoordinator::new(store).with_policy(MatchPolicy::Fuzzy);

        let result = coordinator.search("pumps", 10).await;

        assert!(matches!(result, Err(SearchError::Unavailable(_))));
        Ok(())
    }
}
