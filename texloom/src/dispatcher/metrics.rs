//! Dispatcher counters exposed through the handle for observability
//! (SPEC_FULL.md's ambient-stack supplement over spec.md).
//!
//! Grounded on `taskdaemon::coordinator::messages::CoordinatorMetrics`: a
//! handful of atomic counters shared between the actor and its handle,
//! snapshotted without a round trip through the actor's channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
struct Inner {
    submitted: AtomicU64,
    absorbed_duplicates: AtomicU64,
    retried: AtomicU64,
    exhausted: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct DispatcherMetrics(Arc<Inner>);

impl DispatcherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submitted(&self) {
        self.0.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_absorbed_duplicate(&self) {
        self.0.absorbed_duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retried(&self) {
        self.0.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self) {
        self.0.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatcherMetricsSnapshot {
        DispatcherMetricsSnapshot {
            submitted: self.0.submitted.load(Ordering::Relaxed),
            absorbed_duplicates: self.0.absorbed_duplicates.load(Ordering::Relaxed),
            retried: self.0.retried.load(Ordering::Relaxed),
            exhausted: self.0.exhausted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherMetricsSnapshot {
    pub submitted: u64,
    pub absorbed_duplicates: u64,
    pub retried: u64,
    pub exhausted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_clones() {
        let metrics = DispatcherMetrics::new();
        let clone = metrics.clone();
        metrics.record_submitted();
        clone.record_submitted();
        clone.record_exhausted();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.submitted, 2);
        assert_eq!(snapshot.exhausted, 1);
    }
}
