//! Prometheus gauges mirroring `get_stats()`

use prometheus::{register_int_gauge_with_registry, IntGauge, Opts, Registry};

use crate::stats::StatsSnapshot;

#[derive(Clone)]
pub struct LineageMetrics {
    pub events_received: IntGauge,
    pub events_persisted: IntGauge,
    pub events_failed: IntGauge,
    pub edges_created: IntGauge,
    pub queue_size: IntGauge,
}

impl LineageMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            events_received: register_int_gauge_with_registry!(
                Opts::new("lineage_events_received", "Events accepted into the queue"),
                registry
            )?,
            events_persisted: register_int_gauge_with_registry!(
                Opts::new("lineage_events_persisted", "Events committed to the store"),
                registry
            )?,
            events_failed: register_int_gauge_with_registry!(
                Opts::new(
                    "lineage_events_failed",
                    "Events rejected at enqueue or discarded by a failed flush"
                ),
                registry
            )?,
            edges_created: register_int_gauge_with_registry!(
                Opts::new("lineage_edges_created", "New lineage edge keys"),
                registry
            )?,
            queue_size: register_int_gauge_with_registry!(
                Opts::new("lineage_queue_size", "Events waiting for the batch worker"),
                registry
            )?,
        })
    }

    pub fn observe(&self, snapshot: &StatsSnapshot) {
        self.events_received.set(clamp(snapshot.events_received));
        self.events_persisted.set(clamp(snapshot.events_persisted));
        self.events_failed.set(clamp(snapshot.events_failed));
        self.edges_created.set(clamp(snapshot.edges_created));
        self.queue_size.set(clamp(snapshot.queue_size as u64));
    }
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
