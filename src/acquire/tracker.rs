//! Outstanding-work counter with a deadline join.
//!
//! Acquisitions are detached tasks. The tracker counts how many are still
//! running so a collection build can wait for them up to a deadline, after
//! which stragglers keep running in the background.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    outstanding: AtomicUsize,
    idle: Notify,
}

/// Shared counter of in-flight acquisitions.
#[derive(Clone, Default)]
pub struct AcquisitionTracker {
    inner: Arc<Inner>,
}

/// Decrements the tracker when dropped, including on panic.
pub struct WorkGuard {
    inner: Arc<Inner>,
}

impl AcquisitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of work.
    pub fn begin(&self) -> WorkGuard {
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        WorkGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Wait until no work is outstanding or `timeout` elapses.
    ///
    /// Returns `true` if the tracker went idle, `false` on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.inner.idle.notified();
                tokio::pin!(notified);
                // Register before checking so a concurrent drop is not missed
                notified.as_mut().enable();
                if self.outstanding() == 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        if self.inner.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
