//! Jobs, requests and result delivery
//!
//! This module defines the request lifecycle types:
//!
//! - [`JobError`]: everything that can surface on a result sink besides the
//!   job's own output
//! - [`ResponseHandle`]: the receive side of the one-shot result sink
//! - [`Request`]: a submitted job plus its sink and optional deadline,
//!   type-erased so one runner can carry arbitrary result types

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::oneshot;

use crate::runner::pending::CompletionToken;
use crate::runner::stats::RunnerStats;

/// Result type delivered on a job's result sink
pub type JobResult<T> = Result<T, JobError>;

/// Errors delivered on a result sink in place of a job result
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The deadline fired before the job was admitted; the job never ran
    #[error("job expired before admission")]
    Expired,

    /// The job panicked during execution
    #[error("job panicked: {0}")]
    Panicked(String),

    /// The runner was discarded before the job was serviced
    #[error("job cancelled before execution")]
    Cancelled,

    /// The job ran and returned this error
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Receive side of a job's one-shot result sink
///
/// Exactly one response is delivered per submitted job. A sink closed
/// without a send (the runner was dropped with the job unserviced) surfaces
/// as [`JobError::Cancelled`].
pub struct ResponseHandle<T> {
    rx: oneshot::Receiver<JobResult<T>>,
}

impl<T> ResponseHandle<T> {
    pub(crate) fn new(rx: oneshot::Receiver<JobResult<T>>) -> Self {
        Self { rx }
    }

    /// Wait for the job's single response
    pub async fn recv(self) -> JobResult<T> {
        match self.rx.await {
            Ok(response) => response,
            Err(_) => Err(JobError::Cancelled),
        }
    }
}

/// Type-erased execution seam between a request and its typed sink
///
/// Either `execute` or `reject` is called exactly once; both consume the
/// payload and deliver the single response. Counter updates happen before
/// the send so a submitter that receives the response observes settled
/// stats.
#[async_trait]
trait Payload: Send {
    /// Run the job, account the outcome and deliver the result
    async fn execute(self: Box<Self>, stats: &RunnerStats);

    /// Deliver `err` without running the job
    fn reject(self: Box<Self>, err: JobError);
}

struct TypedPayload<T, F> {
    job: F,
    tx: oneshot::Sender<JobResult<T>>,
}

#[async_trait]
impl<T, F> Payload for TypedPayload<T, F>
where
    T: Send + 'static,
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    async fn execute(self: Box<Self>, stats: &RunnerStats) {
        let TypedPayload { job, tx } = *self;

        let (response, errored) = match AssertUnwindSafe(job).catch_unwind().await {
            Ok(Ok(value)) => (Ok(value), false),
            Ok(Err(err)) => (Err(JobError::Failed(err)), true),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log::error!("job panicked: {}", message);
                (Err(JobError::Panicked(message)), true)
            }
        };

        stats.job_finished(errored);

        // the submitter may have dropped its handle; that is not an error
        let _ = tx.send(response);
    }

    fn reject(self: Box<Self>, err: JobError) {
        let _ = self.tx.send(Err(err));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

/// A submitted job together with its result sink and optional deadline
///
/// Owned by the submission queue until a worker dequeues it; immutable after
/// construction except for the terminal write to the sink.
pub(crate) struct Request {
    payload: Box<dyn Payload>,
    deadline: Option<Instant>,
    token: CompletionToken,
}

impl Request {
    pub(crate) fn new<T, F>(
        job: F,
        tx: oneshot::Sender<JobResult<T>>,
        deadline: Option<Instant>,
        token: CompletionToken,
    ) -> Self
    where
        T: Send + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            payload: Box::new(TypedPayload { job, tx }),
            deadline,
            token,
        }
    }

    /// True iff a deadline is set and lies strictly in the past
    pub(crate) fn is_expired(&self) -> bool {
        match self.deadline {
            Some(deadline) => deadline < Instant::now(),
            None => false,
        }
    }

    /// True iff a deadline is set and would have passed `d` from now
    ///
    /// Lets a worker decide before sleeping whether the sleep itself would
    /// expire the request.
    pub(crate) fn is_expired_after(&self, d: Duration) -> bool {
        match self.deadline {
            Some(deadline) => deadline < Instant::now() + d,
            None => false,
        }
    }

    /// Deliver `err` without running the job, then settle the completion
    /// token
    pub(crate) fn reject(self, err: JobError, stats: &RunnerStats) {
        stats.record_rejected();
        self.payload.reject(err);
        self.token.complete();
    }

    /// Run the job, deliver its result, then settle the completion token
    pub(crate) async fn execute(self, stats: &RunnerStats) {
        stats.job_started();
        self.payload.execute(stats).await;
        self.token.complete();
    }
}
