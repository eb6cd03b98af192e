//! # Pacer - Rate-Limited Job Runner
//!
//! A library for running caller-supplied jobs under a conjunction of
//! sliding-window rate limits while extracting maximum allowed throughput.
//!
//! ## Architecture
//!
//! - `config`: quota and worker pool configuration
//! - `limiter`: sliding-window quotas and their atomic AND-conjunction
//! - `job`: the request lifecycle and one-shot result delivery
//! - `runner`: the worker pool and the public submit / start / stop /
//!   await-all facade
//!
//! ## Features
//!
//! - Multi-window quotas joined by logical AND (for example "at most 10
//!   calls per second AND 30 per minute AND 100 per hour")
//! - Bounded concurrency with back-pressure through a bounded submission
//!   queue
//! - Per-request deadlines checked both at dequeue and before every
//!   admission wait
//! - Exactly-once result delivery on a one-shot channel per submission
//! - Graceful start/stop: a stopped worker always finishes the request it
//!   holds

#![warn(missing_docs)]
#![warn(clippy::all)]

// Configuration surface
pub mod config;

// Request lifecycle and result delivery
pub mod job;

// Sliding-window admission control
pub mod limiter;

// Worker pool and public facade
pub mod runner;

// Re-export commonly used types
pub use config::{QuotaConfig, RunnerConfig, DEFAULT_CONCURRENCY};
pub use job::{JobError, JobResult, ResponseHandle};
pub use limiter::{Quota, QuotaError, QuotaGroup, QuotaResult};
pub use runner::{Runner, StatsSnapshot};

/// Re-export version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
