use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Checked by ingestion before each file is started.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

/// Held by whoever may abort the ingestion (e.g. a Ctrl-C listener).
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> (Self, CancellationHandle) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let token = Self {
            cancelled: cancelled.clone(),
        };
        (token, CancellationHandle { cancelled })
    }

    /// A token nobody can cancel.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationToken;

    #[test]
    fn cancel_is_seen_by_every_clone() {
        let (token, handle) = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());

        handle.cancel();
        handle.cancel();

        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[test]
    fn never_token_stays_live() {
        assert!(!CancellationToken::never().is_cancelled());
    }
}
