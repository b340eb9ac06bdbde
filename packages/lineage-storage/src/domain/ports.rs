//! Storage Port (Trait Interface)
//!
//! Port/Adapter pattern for backend flexibility:
//! - Local / single node: SQLite (`SqliteLineageStore`)
//! - Testing: InMemory (`InMemoryLineageStore`)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::models::{LineageEdge, LineageEvent};
use crate::Result;

/// Outcome of one atomic batch commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCommit {
    /// Event rows appended to the log
    pub events_inserted: usize,
    /// Edges written (inserted or updated)
    pub edges_upserted: usize,
    /// Edges whose key did not exist before this commit
    pub edges_created: usize,
}

/// Store-level counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub event_count: usize,
    pub edge_count: usize,
}

/// Lineage persistence abstraction.
///
/// Events form an append-only log: inserting the same event twice stores
/// two rows. Edges are upserted by `EdgeKey`; an upsert overwrites
/// `transformation`, `description` and `metadata` with the incoming values.
///
/// # Implementations
///
/// - `InMemoryLineageStore`: HashMap/Vec backed, for tests
/// - `SqliteLineageStore`: SQLite with `ON CONFLICT DO UPDATE` upserts
#[async_trait]
pub trait LineageStore: Send + Sync {
    // ═══════════════════════════════════════════════════════════════════════
    // Write Path
    // ═══════════════════════════════════════════════════════════════════════

    /// Append events to the log (single transaction)
    async fn insert_events(&self, events: &[LineageEvent]) -> Result<usize>;

    /// Upsert edges by identity key (single transaction)
    ///
    /// # Returns
    ///
    /// Number of edges whose key was new
    async fn upsert_edges(&self, edges: &[LineageEdge]) -> Result<usize>;

    /// Append events and upsert edges in one transaction.
    ///
    /// Either everything is visible afterwards or nothing is.
    async fn commit_batch(
        &self,
        events: &[LineageEvent],
        edges: &[LineageEdge],
    ) -> Result<BatchCommit>;

    // ═══════════════════════════════════════════════════════════════════════
    // Edge Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Outgoing edges of `namespace.name`, ordered by target key
    async fn find_edges_by_source(&self, namespace: &str, name: &str) -> Result<Vec<LineageEdge>>;

    /// Incoming edges of `namespace.name`, ordered by source key
    async fn find_edges_by_target(&self, namespace: &str, name: &str) -> Result<Vec<LineageEdge>>;

    // ═══════════════════════════════════════════════════════════════════════
    // Event Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Most recent events first (event time, then insertion order)
    async fn find_recent_events(&self, limit: usize) -> Result<Vec<LineageEvent>>;

    /// Most recent events of the job named `job_name` (any namespace)
    async fn find_events_by_job(&self, job_name: &str, limit: usize) -> Result<Vec<LineageEvent>>;

    // ═══════════════════════════════════════════════════════════════════════
    // Statistics
    // ═══════════════════════════════════════════════════════════════════════

    async fn get_stats(&self) -> Result<StoreStats>;
}
