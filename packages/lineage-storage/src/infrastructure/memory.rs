//! In-Memory Lineage Store
//!
//! Vec + BTreeMap backed implementation for unit tests and embedding.
//! Can be switched "offline" to exercise failure paths.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::models::{EdgeKey, LineageEdge, LineageEvent};
use crate::domain::ports::{BatchCommit, LineageStore, StoreStats};
use crate::{Result, StorageError};

#[derive(Default)]
struct MemoryState {
    events: Vec<LineageEvent>,
    edges: BTreeMap<EdgeKey, LineageEdge>,
}

impl MemoryState {
    fn upsert(&mut self, edges: &[LineageEdge]) -> usize {
        let mut created = 0;
        for edge in edges {
            if self.edges.insert(edge.key(), edge.clone()).is_none() {
                created += 1;
            }
        }
        created
    }

    fn recent<'a>(
        &'a self,
        filter: impl Fn(&LineageEvent) -> bool,
        limit: usize,
    ) -> Vec<LineageEvent> {
        let mut ordered: Vec<(usize, &'a LineageEvent)> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| filter(e))
            .collect();
        ordered.sort_by(|a, b| {
            b.1.event_time
                .cmp(&a.1.event_time)
                .then_with(|| b.0.cmp(&a.0))
        });
        ordered
            .into_iter()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct InMemoryLineageStore {
    state: Arc<RwLock<MemoryState>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryLineageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails with `ErrorKind::Unavailable`
    pub fn simulate_outage(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("in-memory store is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl LineageStore for InMemoryLineageStore {
    async fn insert_events(&self, events: &[LineageEvent]) -> Result<usize> {
        self.ensure_online()?;
        self.state.write().events.extend_from_slice(events);
        Ok(events.len())
    }

    async fn upsert_edges(&self, edges: &[LineageEdge]) -> Result<usize> {
        self.ensure_online()?;
        Ok(self.state.write().upsert(edges))
    }

    async fn commit_batch(
        &self,
        events: &[LineageEvent],
        edges: &[LineageEdge],
    ) -> Result<BatchCommit> {
        self.ensure_online()?;
        let mut state = self.state.write();
        state.events.extend_from_slice(events);
        let edges_created = state.upsert(edges);
        Ok(BatchCommit {
            events_inserted: events.len(),
            edges_upserted: edges.len(),
            edges_created,
        })
    }

    async fn find_edges_by_source(&self, namespace: &str, name: &str) -> Result<Vec<LineageEdge>> {
        self.ensure_online()?;
        Ok(self
            .state
            .read()
            .edges
            .values()
            .filter(|e| e.source.is(namespace, name))
            .cloned()
            .collect())
    }

    async fn find_edges_by_target(&self, namespace: &str, name: &str) -> Result<Vec<LineageEdge>> {
        self.ensure_online()?;
        Ok(self
            .state
            .read()
            .edges
            .values()
            .filter(|e| e.target.is(namespace, name))
            .cloned()
            .collect())
    }

    async fn find_recent_events(&self, limit: usize) -> Result<Vec<LineageEvent>> {
        self.ensure_online()?;
        Ok(self.state.read().recent(|_| true, limit))
    }

    async fn find_events_by_job(&self, job_name: &str, limit: usize) -> Result<Vec<LineageEvent>> {
        self.ensure_online()?;
        Ok(self
            .state
            .read()
            .recent(|e| e.job_name() == Some(job_name), limit))
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        self.ensure_online()?;
        let state = self.state.read();
        Ok(StoreStats {
            event_count: state.events.len(),
            edge_count: state.edges.len(),
        })
    }
}
