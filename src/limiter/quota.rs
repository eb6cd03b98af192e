//! Sliding-window quota
//!
//! A [`Quota`] tracks up to `capacity` admissions within any trailing window
//! of the configured length. Retirement is lazy: expired entries are stripped
//! from the head of the log when the log is next written, so no background
//! timers are needed.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::config::QuotaConfig;

/// Result type for quota operations
pub type QuotaResult<T> = Result<T, QuotaError>;

/// Quota construction errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QuotaError {
    /// Capacity was configured as zero
    #[error("quota capacity must be a positive value")]
    ZeroCapacity,

    /// Interval was configured as zero
    #[error("quota interval must be a positive value")]
    ZeroInterval,
}

/// Sliding-window admission counter
///
/// Maintains the timestamps of recent admissions. An admission occupies its
/// slot for exactly the window length; the oldest entry is retired once its
/// age reaches the window.
#[derive(Debug)]
pub struct Quota {
    capacity: usize,
    window: Duration,
    /// Admission timestamps, oldest first; length never exceeds `capacity`
    events: RwLock<VecDeque<Instant>>,
}

impl Quota {
    /// Create a quota from its configuration
    pub fn new(cfg: QuotaConfig) -> QuotaResult<Self> {
        if cfg.capacity == 0 {
            return Err(QuotaError::ZeroCapacity);
        }

        if cfg.interval.is_zero() {
            return Err(QuotaError::ZeroInterval);
        }

        Ok(Self {
            capacity: cfg.capacity as usize,
            window: cfg.interval,
            events: RwLock::new(VecDeque::with_capacity(cfg.capacity as usize)),
        })
    }

    /// Maximum admissions within the window
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an admission at `t`
    ///
    /// Never blocks beyond the brief exclusive lock; expired head entries are
    /// retired on the same pass.
    pub fn add(&self, t: Instant) {
        let mut events = self.events.write();
        Self::retire_expired(&mut events, self.window, Instant::now());
        events.push_back(t);
    }

    /// Number of free slots; zero or less means the quota is full
    pub fn free_slots(&self) -> i64 {
        let now = Instant::now();
        let events = self.events.read();
        let active = events.len() - Self::expired_prefix(&events, self.window, now);

        self.capacity as i64 - active as i64
    }

    /// Check for a free slot
    ///
    /// Returns `(Duration::ZERO, true)` when a slot is available, otherwise
    /// `(wait, false)` where `wait` is the time until the oldest outstanding
    /// admission retires.
    pub fn get_free_slot(&self) -> (Duration, bool) {
        let now = Instant::now();
        let events = self.events.read();
        let expired = Self::expired_prefix(&events, self.window, now);
        let active = events.len() - expired;

        if active < self.capacity {
            return (Duration::ZERO, true);
        }

        let oldest = events[expired];
        let wait = (oldest + self.window).saturating_duration_since(now);

        (wait, false)
    }

    /// Count of ordered entries at the head whose age has reached the window
    fn expired_prefix(events: &VecDeque<Instant>, window: Duration, now: Instant) -> usize {
        events
            .iter()
            .take_while(|&&t| now.duration_since(t) >= window)
            .count()
    }

    fn retire_expired(events: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        while let Some(&head) = events.front() {
            if now.duration_since(head) >= window {
                events.pop_front();
            } else {
                break;
            }
        }
    }
}
