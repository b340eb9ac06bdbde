//! Ingestion counters shared by the emitter and the worker

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
    edges_created: AtomicU64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self, count: usize) {
        self.failed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_persisted(&self, events: usize, edges_created: usize) {
        self.persisted.fetch_add(events as u64, Ordering::Relaxed);
        self.edges_created
            .fetch_add(edges_created as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, queue_size: usize) -> StatsSnapshot {
        StatsSnapshot {
            events_received: self.received.load(Ordering::Relaxed),
            events_persisted: self.persisted.load(Ordering::Relaxed),
            events_failed: self.failed.load(Ordering::Relaxed),
            edges_created: self.edges_created.load(Ordering::Relaxed),
            queue_size,
        }
    }
}

/// Point-in-time view returned by `get_stats()`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub events_received: u64,
    pub events_persisted: u64,
    /// Rejected at enqueue plus discarded by failed flushes
    pub events_failed: u64,
    /// Edge keys that did not exist before their flush
    pub edges_created: u64,
    pub queue_size: usize,
}
