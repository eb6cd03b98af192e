//! Rate-limited job runner
//!
//! The [`Runner`] is the public facade of the crate. It owns the quota
//! group, the bounded submission queue, the worker pool and the
//! outstanding-work counter, and exposes the submit / start / stop /
//! await-all lifecycle.
//!
//! # Example
//!
//! ```rust,no_run
//! use pacer::{QuotaConfig, Runner, RunnerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! // at most 10 calls per second AND 100 calls per hour, 4 workers
//! let mut cfg = RunnerConfig::new().concurrency(4);
//! cfg.add_quota(QuotaConfig::new(10, Duration::from_secs(1)))
//!     .add_quota(QuotaConfig::new(100, Duration::from_secs(3600)));
//!
//! let runner = Runner::new(cfg)?;
//! runner.start();
//!
//! let handle = runner.submit(async { Ok::<_, anyhow::Error>("done") });
//! let value = handle.recv().await?;
//! println!("job returned: {}", value);
//!
//! runner.await_all().await;
//! runner.stop();
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::config::RunnerConfig;
use crate::job::{Request, ResponseHandle};
use crate::limiter::{QuotaGroup, QuotaResult};
use crate::runner::pending::{CompletionToken, PendingJobs};
use crate::runner::stats::RunnerStats;
use crate::runner::worker::{SharedQueue, Worker};

pub(crate) mod pending;

/// Runner statistics counters
pub mod stats;

pub(crate) mod worker;

pub use stats::StatsSnapshot;

/// Rate-limited job runner
///
/// Jobs submitted to the runner are queued, admitted against the configured
/// quota conjunction and executed by a bounded worker pool. Each submission
/// returns a [`ResponseHandle`] delivering exactly one response.
#[derive(Debug)]
pub struct Runner {
    queue_tx: mpsc::Sender<Request>,
    workers: Vec<Worker>,
    /// Guards the start/stop transition of the pool as a whole
    running: Mutex<bool>,
    pending: Arc<PendingJobs>,
    stats: Arc<RunnerStats>,
}

impl Runner {
    /// Build a runner from its configuration
    ///
    /// Construction is all-or-nothing: an invalid quota fails the whole
    /// runner and no queue or worker is created. Workers stay idle until
    /// [`start`](Self::start). A configured concurrency of zero is treated
    /// as one.
    pub fn new(cfg: RunnerConfig) -> QuotaResult<Self> {
        let group = Arc::new(QuotaGroup::new(&cfg.quotas)?);
        let concurrency = cfg.concurrency.max(1);

        let (queue_tx, queue_rx) = mpsc::channel(concurrency);
        let queue: SharedQueue = Arc::new(tokio::sync::Mutex::new(queue_rx));
        let stats = Arc::new(RunnerStats::default());

        let workers = (0..concurrency)
            .map(|id| {
                Worker::new(
                    id,
                    Arc::clone(&group),
                    Arc::clone(&queue),
                    Arc::clone(&stats),
                )
            })
            .collect();

        log::info!(
            "job runner configured: concurrency={}, quotas={}",
            concurrency,
            group.len()
        );

        Ok(Self {
            queue_tx,
            workers,
            running: Mutex::new(false),
            pending: Arc::new(PendingJobs::new()),
            stats,
        })
    }

    /// Submit a job with no deadline
    ///
    /// Equivalent to [`submit_with_timeout`](Self::submit_with_timeout) with
    /// a zero timeout.
    pub fn submit<T, F>(&self, job: F) -> ResponseHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.submit_with_timeout(job, Duration::ZERO)
    }

    /// Submit a job that expires `timeout` from now
    ///
    /// A zero timeout means the job never expires. The deadline bounds only
    /// the wait-to-start: once a job is executing it is never interrupted.
    /// The returned handle is available immediately; the enqueue itself
    /// happens on a background task, so a full queue never blocks the
    /// caller.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit_with_timeout<T, F>(&self, job: F, timeout: Duration) -> ResponseHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let deadline = if timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + timeout)
        };

        let token = CompletionToken::new(Arc::clone(&self.pending), Arc::clone(&self.stats));
        let request = Request::new(job, tx, deadline, token);

        let queue_tx = self.queue_tx.clone();
        tokio::spawn(async move {
            if queue_tx.send(request).await.is_err() {
                // receiver gone: dropping the request closes its sink
                log::warn!("submission queue closed, request dropped");
            }
        });

        ResponseHandle::new(rx)
    }

    /// Start all workers; a no-op when already running
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock();

        if *running {
            return;
        }

        for worker in &self.workers {
            worker.start();
        }
        *running = true;

        log::info!("job runner started: {} workers", self.workers.len());
    }

    /// Stop all workers; a no-op when already stopped
    ///
    /// Each worker finishes the request it currently holds; requests still
    /// queued are serviced only after another [`start`](Self::start).
    pub fn stop(&self) {
        let mut running = self.running.lock();

        if !*running {
            return;
        }

        for worker in &self.workers {
            worker.stop();
        }
        *running = false;

        log::info!("job runner stopped");
    }

    /// Observable running state of the pool
    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    /// Wait until every submitted request has reached a terminal state
    ///
    /// Returns immediately when no work is outstanding. Legal after
    /// [`stop`](Self::stop), but requests still sitting in the queue keep
    /// this waiting until they are serviced after a restart or the runner is
    /// dropped.
    pub async fn await_all(&self) {
        self.pending.wait_idle().await;
    }

    /// Snapshot of the runner counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuotaConfig;
    use crate::job::JobError;
    use crate::limiter::QuotaError;

    #[tokio::test]
    async fn test_construction_propagates_quota_errors() {
        let cfg = RunnerConfig::with_quotas(vec![QuotaConfig::new(0, Duration::from_secs(1))]);
        let err = Runner::new(cfg).unwrap_err();
        assert_eq!(err, QuotaError::ZeroCapacity);

        let cfg = RunnerConfig::with_quotas(vec![QuotaConfig::new(10, Duration::ZERO)]);
        let err = Runner::new(cfg).unwrap_err();
        assert_eq!(err, QuotaError::ZeroInterval);
    }

    #[tokio::test]
    async fn test_zero_concurrency_clamped_to_one() {
        let runner = Runner::new(RunnerConfig::new().concurrency(0)).unwrap();
        assert_eq!(runner.workers.len(), 1);
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let runner = Runner::new(RunnerConfig::new().concurrency(2)).unwrap();

        assert!(!runner.is_running());
        assert!(!runner.workers[0].is_running());
        assert!(!runner.workers[1].is_running());

        runner.start();
        runner.start();
        assert!(runner.is_running());
        assert!(runner.workers[0].is_running());
        assert!(runner.workers[1].is_running());

        runner.stop();
        runner.stop();
        assert!(!runner.is_running());
        assert!(!runner.workers[0].is_running());
        assert!(!runner.workers[1].is_running());
    }

    #[tokio::test]
    async fn test_submit_executes_job() {
        let runner = Runner::new(RunnerConfig::new().concurrency(1)).unwrap();
        runner.start();

        let handle = runner.submit(async { Ok("foo") });
        assert_eq!(handle.recv().await.unwrap(), "foo");
    }

    #[tokio::test]
    async fn test_submit_with_timeout_executes_in_time() {
        let runner = Runner::new(RunnerConfig::new().concurrency(1)).unwrap();
        runner.start();

        let handle = runner.submit_with_timeout(async { Ok("foo") }, Duration::from_secs(1));
        assert_eq!(handle.recv().await.unwrap(), "foo");
    }

    #[tokio::test]
    async fn test_job_error_passes_through() {
        let runner = Runner::new(RunnerConfig::new().concurrency(1)).unwrap();
        runner.start();

        let handle = runner.submit(async { Err::<(), _>(anyhow::anyhow!("bad gateway")) });

        let err = handle.recv().await.unwrap_err();
        assert!(matches!(err, JobError::Failed(_)));
        assert_eq!(err.to_string(), "bad gateway");

        runner.await_all().await;
        assert_eq!(runner.stats().errored, 1);
    }
}
