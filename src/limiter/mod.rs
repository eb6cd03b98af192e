//! Sliding-window admission control
//!
//! This module implements the quota layer of the runner:
//!
//! - [`Quota`]: a single sliding-window counter (capacity over a trailing
//!   window)
//! - [`QuotaGroup`]: an ordered conjunction of quotas with atomic
//!   reservation across all members

/// Single sliding-window counter
pub mod quota;

/// Conjunction of quotas with atomic reservation
pub mod group;

pub use group::QuotaGroup;
pub use quota::{Quota, QuotaError, QuotaResult};
