//! Runner configuration
//!
//! This module provides the configuration surface for the job runner:
//! - Per-window quota limits (capacity over a trailing interval)
//! - Worker pool concurrency (also the submission queue bound)

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of workers when none is configured
pub const DEFAULT_CONCURRENCY: usize = 100;

/// A single sliding-window limit: at most `capacity` admissions within any
/// trailing window of length `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Maximum admissions within the window
    pub capacity: u32,
    /// Window length
    pub interval: Duration,
}

impl QuotaConfig {
    /// Create a new quota limit
    pub fn new(capacity: u32, interval: Duration) -> Self {
        Self { capacity, interval }
    }
}

/// Runner configuration
///
/// The quota list is a conjunction: a job is admitted only when every quota
/// has a free slot. An empty list means unlimited throughput.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum simultaneously executing jobs; also the capacity of the
    /// submission queue
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Sliding-window limits joined by logical AND
    #[serde(default)]
    pub quotas: Vec<QuotaConfig>,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            quotas: Vec::new(),
        }
    }
}

impl RunnerConfig {
    /// Create a configuration with default concurrency and no quotas
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with the given quota list
    pub fn with_quotas(quotas: Vec<QuotaConfig>) -> Self {
        Self {
            quotas,
            ..Self::default()
        }
    }

    /// Set the worker pool size
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Append a quota limit
    pub fn add_quota(&mut self, quota: QuotaConfig) -> &mut Self {
        self.quotas.push(quota);
        self
    }
}
