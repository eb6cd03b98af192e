//! Worker pool member
//!
//! Each worker is a tokio task competing with its siblings on the shared
//! submission queue. A worker dequeues one request at a time, checks its
//! deadline, waits for quota admission, executes the job and delivers the
//! result. Stopping a worker never abandons the request it holds: the
//! current iteration always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use crate::job::{JobError, Request};
use crate::limiter::QuotaGroup;
use crate::runner::stats::RunnerStats;

/// Submission queue shared by all workers of a runner
pub(crate) type SharedQueue = Arc<tokio::sync::Mutex<mpsc::Receiver<Request>>>;

/// Single queue consumer
///
/// States are Idle (created), Running (between `start` and `stop`) and
/// Stopped; `start` and `stop` are idempotent.
#[derive(Debug)]
pub(crate) struct Worker {
    id: usize,
    group: Arc<QuotaGroup>,
    queue: SharedQueue,
    stats: Arc<RunnerStats>,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    /// Guards start/stop transitions; the loop itself only reads `running`
    transitions: Mutex<()>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        group: Arc<QuotaGroup>,
        queue: SharedQueue,
        stats: Arc<RunnerStats>,
    ) -> Self {
        Self {
            id,
            group,
            queue,
            stats,
            running: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            transitions: Mutex::new(()),
        }
    }

    /// Spawn the consumer loop; a no-op when already running
    pub(crate) fn start(&self) {
        let _guard = self.transitions.lock();

        if self.running.load(Ordering::Acquire) {
            return;
        }
        self.running.store(true, Ordering::Release);

        tokio::spawn(Self::run(
            self.id,
            Arc::clone(&self.group),
            Arc::clone(&self.queue),
            Arc::clone(&self.stats),
            Arc::clone(&self.running),
            Arc::clone(&self.wake),
        ));
    }

    /// Request the loop to exit; a no-op when already stopped
    ///
    /// The worker finishes the request it currently holds and dequeues no
    /// further one.
    pub(crate) fn stop(&self) {
        let _guard = self.transitions.lock();

        if !self.running.load(Ordering::Acquire) {
            return;
        }
        self.running.store(false, Ordering::Release);
        self.wake.notify_waiters();
    }

    /// Observable running state
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    async fn run(
        id: usize,
        group: Arc<QuotaGroup>,
        queue: SharedQueue,
        stats: Arc<RunnerStats>,
        running: Arc<AtomicBool>,
        wake: Arc<Notify>,
    ) {
        log::debug!("worker {} started", id);

        loop {
            if !running.load(Ordering::Acquire) {
                break;
            }

            let request = tokio::select! {
                request = Self::dequeue(&queue) => match request {
                    Some(request) => request,
                    // every sender is gone: the runner was discarded
                    None => break,
                },
                _ = wake.notified() => continue,
            };

            Self::handle(id, &group, &stats, request).await;
        }

        log::debug!("worker {} stopped", id);
    }

    /// Take the next request off the shared queue
    ///
    /// Both the lock acquisition and the receive are cancel-safe, so
    /// aborting this from the stop-notify branch loses no request.
    async fn dequeue(queue: &SharedQueue) -> Option<Request> {
        let mut rx = queue.lock().await;
        rx.recv().await
    }

    async fn handle(id: usize, group: &QuotaGroup, stats: &RunnerStats, request: Request) {
        stats.record_dequeued();

        if request.is_expired() {
            log::debug!("worker {}: request already expired at dequeue", id);
            request.reject(JobError::Expired, stats);
            return;
        }

        // admission: loop until every quota grants a slot, or the deadline
        // makes further waiting pointless
        loop {
            let (reserved, wait) = group.reserve_free_slot();
            if reserved {
                break;
            }

            if request.is_expired_after(wait) {
                log::debug!(
                    "worker {}: request would expire during {:?} admission wait",
                    id,
                    wait
                );
                request.reject(JobError::Expired, stats);
                return;
            }

            log::trace!("worker {}: rate limited, sleeping {:?}", id, wait);
            tokio::time::sleep(wait).await;
        }

        request.execute(stats).await;
    }
}
