//! Outstanding-work tracking
//!
//! [`PendingJobs`] is a waitable counter of submitted-but-not-terminated
//! requests. Each request carries a [`CompletionToken`] that settles the
//! counter exactly once: explicitly when the request reaches a terminal
//! state, or from `Drop` when the request is discarded unserviced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::runner::stats::RunnerStats;

/// Waitable counter of outstanding requests
#[derive(Debug, Default)]
pub(crate) struct PendingJobs {
    count: AtomicU64,
    idle: Notify,
}

impl PendingJobs {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn add(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn complete(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Wait until the counter reaches zero; returns immediately when no work
    /// is outstanding
    pub(crate) async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // register before checking so a completion racing with the check
            // is never missed
            notified.as_mut().enable();

            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }

            notified.await;
        }
    }

    #[cfg(test)]
    pub(crate) fn outstanding(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

/// One-shot guard settling the outstanding counter for a single request
///
/// Construction registers the request; exactly one settlement follows, via
/// [`complete`](Self::complete) on a terminal delivery or via `Drop` when the
/// request is discarded before any worker serviced it.
#[derive(Debug)]
pub(crate) struct CompletionToken {
    pending: Arc<PendingJobs>,
    stats: Arc<RunnerStats>,
    settled: bool,
}

impl CompletionToken {
    pub(crate) fn new(pending: Arc<PendingJobs>, stats: Arc<RunnerStats>) -> Self {
        pending.add();
        stats.record_submitted();

        Self {
            pending,
            stats,
            settled: false,
        }
    }

    /// Settle after a terminal delivery; the caller already accounted the
    /// outcome in the stats
    pub(crate) fn complete(mut self) {
        self.settled = true;
        self.pending.complete();
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if !self.settled {
            // discarded unserviced: the request was still queued
            self.stats.record_dropped();
            self.pending.complete();
        }
    }
}
