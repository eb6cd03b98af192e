//! Quota conjunction with atomic reservation
//!
//! A [`QuotaGroup`] joins an ordered set of quotas by logical AND: a slot is
//! reserved only when every member has capacity, and all members are stamped
//! with the same admission timestamp.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::QuotaConfig;
use crate::limiter::quota::{Quota, QuotaResult};

/// Ordered set of quotas joined by logical AND
#[derive(Debug)]
pub struct QuotaGroup {
    quotas: Vec<Quota>,
    /// Serializes the inspect-all-then-commit-all admission sequence
    admission: Mutex<()>,
}

impl QuotaGroup {
    /// Build a group from quota configurations
    ///
    /// Fails on the first invalid quota; construction is all-or-nothing.
    pub fn new(cfgs: &[QuotaConfig]) -> QuotaResult<Self> {
        let quotas = cfgs
            .iter()
            .map(|cfg| Quota::new(*cfg))
            .collect::<QuotaResult<Vec<_>>>()?;

        Ok(Self {
            quotas,
            admission: Mutex::new(()),
        })
    }

    /// Number of member quotas
    pub fn len(&self) -> usize {
        self.quotas.len()
    }

    /// Whether the group has no member quotas (unlimited throughput)
    pub fn is_empty(&self) -> bool {
        self.quotas.is_empty()
    }

    /// Try to reserve one slot in every member quota
    ///
    /// Returns `(true, Duration::ZERO)` when the reservation succeeded; the
    /// caller is expected to use the slot immediately. Otherwise returns
    /// `(false, wait)` where `wait` is the maximum wait across the blocking
    /// quotas: after sleeping that long at least the tightest blocker has
    /// freed, though another quota may still block, so callers loop.
    pub fn reserve_free_slot(&self) -> (bool, Duration) {
        let _guard = self.admission.lock();

        if self.quotas.is_empty() {
            return (true, Duration::ZERO);
        }

        let mut wait = Duration::ZERO;
        let mut limited = false;
        for quota in &self.quotas {
            let (quota_wait, free) = quota.get_free_slot();

            if !free {
                limited = true;
                wait = wait.max(quota_wait);
            }
        }

        if limited {
            log::trace!("admission blocked, next slot in {:?}", wait);
            return (false, wait);
        }

        // all members have capacity: commit with one shared timestamp
        let now = Instant::now();
        for quota in &self.quotas {
            quota.add(now);
        }

        (true, Duration::ZERO)
    }
}
