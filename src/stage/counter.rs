use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Completion counters shared by concurrent callers
#[derive(Debug, Default)]
pub struct RequestCounter {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    changed: Notify,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.succeeded() + self.failed()
    }

    /// Resolve once at least `n` requests have completed
    pub async fn wait_for(&self, n: usize) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.completed() >= n {
                return;
            }
            notified.await;
        }
    }
}
