use crate::traits::{DocumentIndex, REFRESH_DISABLED};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Process-scoped ownership of the index refresh interval.
///
/// Ingestion suspends periodic refresh before its first bulk load; the owner of
/// the process calls [`RefreshWindow::restore`] once at shutdown. Share it
/// between requests with an `Arc`.
#[derive(Debug)]
pub struct RefreshWindow {
    normal_interval: String,
    suspended: AtomicBool,
    restored: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    /// Nothing was suspended by this process.
    NotSuspended,
    AlreadyRestored,
    Failed,
}

impl RefreshWindow {
    pub fn new(normal_interval: impl Into<String>) -> Self {
        Self {
            normal_interval: normal_interval.into(),
            suspended: AtomicBool::new(false),
            restored: AtomicBool::new(false),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// Turns periodic refresh off unless this process already did.
    ///
    /// A failed attempt is logged and retried by the next batch.
    pub async fn suspend<S>(&self, store: &S)
    where
        S: DocumentIndex + Sync + ?Sized,
    {
        if self.restored.load(Ordering::SeqCst) {
            return;
        }
        if self.suspended.swap(true, Ordering::SeqCst) {
            return;
        }

        match store.put_refresh_interval(REFRESH_DISABLED).await {
            Ok(()) => info!("index refresh suspended for bulk loading"),
            Err(error) => {
                self.suspended.store(false, Ordering::SeqCst);
                warn!(error = %error, "could not suspend index refresh");
            }
        }
    }

    /// Puts the normal interval back. Only the first call does anything.
    pub async fn restore<S>(&self, store: &S) -> RestoreOutcome
    where
        S: DocumentIndex + Sync + ?Sized,
    {
        if self.restored.swap(true, Ordering::SeqCst) {
            return RestoreOutcome::AlreadyRestored;
        }
        if !self.suspended.load(Ordering::SeqCst) {
            return RestoreOutcome::NotSuspended;
        }

        match store.put_refresh_interval(&self.normal_interval).await {
            Ok(()) => {
                self.suspended.store(false, Ordering::SeqCst);
                info!(interval = %self.normal_interval, "index refresh interval restored");
                RestoreOutcome::Restored
            }
            Err(error) => {
                warn!(error = %error, "could not restore index refresh interval");
                RestoreOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeIndex;

    #[tokio::test]
    async fn suspends_once_and_restores_once() {
        let store = FakeIndex::default();
        let window = RefreshWindow::new("1s");

        window.suspend(&store).await;
        window.suspend(&store).await;
        window.suspend(&store).await;
        assert!(window.is_suspended());

        assert_eq!(window.restore(&store).await, RestoreOutcome::Restored);
        assert_eq!(window.restore(&store).await, RestoreOutcome::AlreadyRestored);
        assert!(!window.is_suspended());

        assert_eq!(
            store.refresh_intervals(),
            vec!["-1".to_string(), "1s".to_string()]
        );
    }

    #[tokio::test]
    async fn restore_without_suspension_leaves_store_alone() {
        let store = FakeIndex::default();
        let window = RefreshWindow::new("1s");

        assert_eq!(window.restore(&store).await, RestoreOutcome::NotSuspended);
        assert!(store.refresh_intervals().is_empty());
    }

    #[tokio::test]
    async fn failed_restore_is_reported_not_raised() {
        let store = FakeIndex::default();
        let window = RefreshWindow::new("1s");
        window.suspend(&store).await;

        store.fail_settings(true);

        assert_eq!(window.restore(&store).await, RestoreOutcome::Failed);
        assert_eq!(window.restore(&store).await, RestoreOutcome::AlreadyRestored);
    }

    #[tokio::test]
    async fn failed_suspend_is_retried_by_the_next_batch() {
        let store = FakeIndex::default();
        let window = RefreshWindow::new("1s");

        store.fail_settings(true);
        window.suspend(&store).await;
        assert!(!window.is_suspended());

        store.fail_settings(false);
        window.suspend(&store).await;
        assert!(window.is_suspended());
    }
}
