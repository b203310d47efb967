//! Lock-free outcome counters

use crate::domain::{FailureKind, Outcome};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-outcome tallies recorded by the engine
#[derive(Debug, Default)]
pub struct AdmissionStats {
    granted: AtomicU64,
    duplicate: AtomicU64,
    exhausted: AtomicU64,
    membership_failures: AtomicU64,
    counter_failures: AtomicU64,
    publish_failures: AtomicU64,
}

impl AdmissionStats {
    /// All counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one decision
    #[inline]
    pub fn record(&self, outcome: &Outcome) {
        let slot = match outcome {
            Outcome::Granted(_) => &self.granted,
            Outcome::DuplicateRequest => &self.duplicate,
            Outcome::QuotaExhausted => &self.exhausted,
            Outcome::TransientFailure(FailureKind::Membership) => &self.membership_failures,
            Outcome::TransientFailure(FailureKind::Counter) => &self.counter_failures,
            Outcome::TransientFailure(FailureKind::Publish) => &self.publish_failures,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            granted: self.granted.load(Ordering::Relaxed),
            duplicate: self.duplicate.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            transient: TransientSnapshot {
                membership: self.membership_failures.load(Ordering::Relaxed),
                counter: self.counter_failures.load(Ordering::Relaxed),
                publish: self.publish_failures.load(Ordering::Relaxed),
            },
        }
    }
}

/// Point-in-time copy of [`AdmissionStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// `Granted` outcomes
    pub granted: u64,
    /// `DuplicateRequest` outcomes
    pub duplicate: u64,
    /// `QuotaExhausted` outcomes
    pub exhausted: u64,
    /// `TransientFailure` outcomes by stage
    pub transient: TransientSnapshot,
}

impl StatsSnapshot {
    /// Decisions recorded in total
    pub fn total(&self) -> u64 {
        self.granted
            + self.duplicate
            + self.exhausted
            + self.transient.membership
            + self.transient.counter
            + self.transient.publish
    }
}

/// Transient failures by stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct TransientSnapshot {
    pub membership: u64,
    pub counter: u64,
    pub publish: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GrantEvent;

    #[test]
    fn test_record_and_snapshot() {
        let stats = AdmissionStats::new();
        stats.record(&Outcome::Granted(GrantEvent::new("a".into(), 1)));
        stats.record(&Outcome::DuplicateRequest);
        stats.record(&Outcome::DuplicateRequest);
        stats.record(&Outcome::TransientFailure(FailureKind::Counter));

        let snap = stats.snapshot();
        assert_eq!(snap.granted, 1);
        assert_eq!(snap.duplicate, 2);
        assert_eq!(snap.exhausted, 0);
        assert_eq!(snap.transient.counter, 1);
        assert_eq!(snap.total(), 4);
    }
}
