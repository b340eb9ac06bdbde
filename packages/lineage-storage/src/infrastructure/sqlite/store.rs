//! SQLite Lineage Store
//!
//! File-based persistent storage using SQLite.
//! Suitable for single-node deployments and tests.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::schema::init_schema;
use crate::domain::models::{DatasetIdentifier, EdgeType, LineageEdge, LineageEvent, Metadata};
use crate::domain::ports::{BatchCommit, LineageStore, StoreStats};
use crate::{Result, StorageError};

const EDGE_COLUMNS: &str = "source_json, target_json, edge_type, transformation, description, metadata";

/// SQLite-based LineageStore implementation
#[derive(Clone)]
pub struct SqliteLineageStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLineageStore {
    /// Open (or create) a database file
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(5))?;
        debug!(path = %db_path.as_ref().display(), "opened lineage database");
        Self::from_connection(conn)
    }

    /// Create an in-memory SQLite store (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Row helpers (run inside a transaction or on the bare connection)
// ═══════════════════════════════════════════════════════════════════════════

fn insert_event_rows(conn: &Connection, events: &[LineageEvent]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO lineage_events
            (event_id, event_type, event_source, event_time_us, job_namespace, job_name, run_id, payload)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    for event in events {
        let payload = serde_json::to_string(event)?;
        stmt.execute(params![
            &event.event_id,
            event.event_type.as_str(),
            event.source.as_str(),
            event.event_time.timestamp_micros(),
            event.job.as_ref().map(|j| j.namespace()),
            event.job.as_ref().map(|j| j.name()),
            &event.run_id,
            payload,
        ])?;
    }
    Ok(events.len())
}

fn upsert_edge_rows(conn: &Connection, edges: &[LineageEdge]) -> Result<usize> {
    let mut exists = conn.prepare_cached(
        "SELECT 1 FROM lineage_edges
         WHERE source_namespace = ?1 AND source_name = ?2
           AND target_namespace = ?3 AND target_name = ?4",
    )?;
    let mut upsert = conn.prepare_cached(
        "INSERT INTO lineage_edges
            (source_namespace, source_name, target_namespace, target_name,
             source_json, target_json, edge_type, transformation, description, metadata,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
         ON CONFLICT(source_namespace, source_name, target_namespace, target_name) DO UPDATE SET
            source_json = excluded.source_json,
            target_json = excluded.target_json,
            edge_type = excluded.edge_type,
            transformation = excluded.transformation,
            description = excluded.description,
            metadata = excluded.metadata,
            updated_at = excluded.updated_at",
    )?;

    let now = Utc::now().timestamp();
    let mut created = 0;
    for edge in edges {
        let key = edge.key();
        let existed = exists
            .query_row(
                params![
                    &key.source_namespace,
                    &key.source_name,
                    &key.target_namespace,
                    &key.target_name
                ],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        upsert.execute(params![
            &key.source_namespace,
            &key.source_name,
            &key.target_namespace,
            &key.target_name,
            serde_json::to_string(&edge.source)?,
            serde_json::to_string(&edge.target)?,
            edge.edge_type.as_str(),
            &edge.transformation,
            &edge.description,
            serde_json::to_string(&edge.metadata)?,
            now,
        ])?;

        if !existed {
            created += 1;
        }
    }
    Ok(created)
}

type EdgeRow = (String, String, String, Option<String>, Option<String>, String);

fn read_edge_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EdgeRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn edge_from_row(row: EdgeRow) -> Result<LineageEdge> {
    let (source_json, target_json, edge_type, transformation, description, metadata) = row;
    Ok(LineageEdge {
        source: serde_json::from_str::<DatasetIdentifier>(&source_json)?,
        target: serde_json::from_str::<DatasetIdentifier>(&target_json)?,
        edge_type: edge_type.parse::<EdgeType>()?,
        transformation,
        description,
        metadata: serde_json::from_str::<Metadata>(&metadata)?,
    })
}

fn query_edges(conn: &Connection, sql: &str, namespace: &str, name: &str) -> Result<Vec<LineageEdge>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(params![namespace, name], read_edge_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(edge_from_row).collect()
}

fn query_events(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<LineageEvent>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let payloads = stmt
        .query_map(params, |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    payloads
        .iter()
        .map(|p| serde_json::from_str::<LineageEvent>(p).map_err(Into::into))
        .collect()
}

/// Writers take the RESERVED lock up front, so a locked database fails at
/// BEGIN instead of midway through the batch
fn begin(conn: &mut Connection) -> Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| StorageError::transaction(format!("BEGIN failed: {}", e)).with_source(e))
}

fn commit(tx: Transaction<'_>) -> Result<()> {
    tx.commit()
        .map_err(|e| StorageError::transaction(format!("COMMIT failed: {}", e)).with_source(e))
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl LineageStore for SqliteLineageStore {
    async fn insert_events(&self, events: &[LineageEvent]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = begin(&mut conn)?;
        let inserted = insert_event_rows(&tx, events)?;
        commit(tx)?;
        Ok(inserted)
    }

    async fn upsert_edges(&self, edges: &[LineageEdge]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = begin(&mut conn)?;
        let created = upsert_edge_rows(&tx, edges)?;
        commit(tx)?;
        Ok(created)
    }

    async fn commit_batch(
        &self,
        events: &[LineageEvent],
        edges: &[LineageEdge],
    ) -> Result<BatchCommit> {
        let mut conn = self.conn.lock();
        // Dropping `tx` on any `?` below rolls the whole batch back
        let tx = begin(&mut conn)?;
        let events_inserted = insert_event_rows(&tx, events)?;
        let edges_created = upsert_edge_rows(&tx, edges)?;
        commit(tx)?;

        Ok(BatchCommit {
            events_inserted,
            edges_upserted: edges.len(),
            edges_created,
        })
    }

    async fn find_edges_by_source(&self, namespace: &str, name: &str) -> Result<Vec<LineageEdge>> {
        let conn = self.conn.lock();
        query_edges(
            &conn,
            &format!(
                "SELECT {} FROM lineage_edges
                 WHERE source_namespace = ?1 AND source_name = ?2
                 ORDER BY target_namespace, target_name",
                EDGE_COLUMNS
            ),
            namespace,
            name,
        )
    }

    async fn find_edges_by_target(&self, namespace: &str, name: &str) -> Result<Vec<LineageEdge>> {
        let conn = self.conn.lock();
        query_edges(
            &conn,
            &format!(
                "SELECT {} FROM lineage_edges
                 WHERE target_namespace = ?1 AND target_name = ?2
                 ORDER BY source_namespace, source_name",
                EDGE_COLUMNS
            ),
            namespace,
            name,
        )
    }

    async fn find_recent_events(&self, limit: usize) -> Result<Vec<LineageEvent>> {
        let conn = self.conn.lock();
        query_events(
            &conn,
            "SELECT payload FROM lineage_events
             ORDER BY event_time_us DESC, seq DESC
             LIMIT ?1",
            params![sql_limit(limit)],
        )
    }

    async fn find_events_by_job(&self, job_name: &str, limit: usize) -> Result<Vec<LineageEvent>> {
        let conn = self.conn.lock();
        query_events(
            &conn,
            "SELECT payload FROM lineage_events
             WHERE job_name = ?1
             ORDER BY event_time_us DESC, seq DESC
             LIMIT ?2",
            params![job_name, sql_limit(limit)],
        )
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let event_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM lineage_events", [], |row| row.get(0))?;
        let edge_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM lineage_edges", [], |row| row.get(0))?;
        Ok(StoreStats {
            event_count: usize::try_from(event_count).unwrap_or_default(),
            edge_count: usize::try_from(edge_count).unwrap_or_default(),
        })
    }
}
