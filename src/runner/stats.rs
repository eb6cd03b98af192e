//! Runner statistics
//!
//! A small tuple of atomic counters: `queued` and `in_progress` are gauges,
//! `done` and `errored` are cumulative. Fields are loaded independently; no
//! cross-counter atomicity is promised, which is sufficient for dashboards.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Internal counter tuple shared by the runner and its workers
#[derive(Debug, Default)]
pub(crate) struct RunnerStats {
    queued: AtomicU64,
    in_progress: AtomicU64,
    done: AtomicU64,
    errored: AtomicU64,
}

impl RunnerStats {
    /// A request entered the submission queue
    pub(crate) fn record_submitted(&self) {
        self.queued.fetch_add(1, Ordering::SeqCst);
    }

    /// A worker took a request off the queue
    pub(crate) fn record_dequeued(&self) {
        self.queued.fetch_sub(1, Ordering::SeqCst);
    }

    /// A request terminated without its job running (expired or cancelled)
    pub(crate) fn record_rejected(&self) {
        self.errored.fetch_add(1, Ordering::SeqCst);
    }

    /// A queued request was discarded unserviced
    pub(crate) fn record_dropped(&self) {
        self.queued.fetch_sub(1, Ordering::SeqCst);
        self.errored.fetch_add(1, Ordering::SeqCst);
    }

    /// A job started executing
    pub(crate) fn job_started(&self) {
        self.in_progress.fetch_add(1, Ordering::SeqCst);
    }

    /// A job finished executing
    pub(crate) fn job_finished(&self, errored: bool) {
        self.in_progress.fetch_sub(1, Ordering::SeqCst);
        if errored {
            self.errored.fetch_add(1, Ordering::SeqCst);
        } else {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Read all four counters, each loaded independently
    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            queued: self.queued.load(Ordering::SeqCst),
            in_progress: self.in_progress.load(Ordering::SeqCst),
            done: self.done.load(Ordering::SeqCst),
            errored: self.errored.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time view of the runner counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Requests submitted but not yet dequeued by a worker
    pub queued: u64,
    /// Jobs currently executing
    pub in_progress: u64,
    /// Jobs that completed without error
    pub done: u64,
    /// Requests that terminated with any error, including expiration,
    /// cancellation and caught panics
    pub errored: u64,
}
