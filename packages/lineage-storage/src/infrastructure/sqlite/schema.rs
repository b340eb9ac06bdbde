use rusqlite::Connection;

use crate::Result;

/// Events: append-only, `seq` breaks ties between equal timestamps.
/// `event_id` is indexed but not unique (a retried batch appends again).
const EVENTS_DDL: &str = "
    CREATE TABLE IF NOT EXISTS lineage_events (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id TEXT NOT NULL,
        event_type TEXT NOT NULL,
        event_source TEXT NOT NULL,
        event_time_us INTEGER NOT NULL,
        job_namespace TEXT,
        job_name TEXT,
        run_id TEXT,
        payload TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_events_time
        ON lineage_events(event_time_us, seq);

    CREATE INDEX IF NOT EXISTS idx_events_job
        ON lineage_events(job_name);

    CREATE INDEX IF NOT EXISTS idx_events_id
        ON lineage_events(event_id);
";

const EDGES_DDL: &str = "
    CREATE TABLE IF NOT EXISTS lineage_edges (
        source_namespace TEXT NOT NULL,
        source_name TEXT NOT NULL,
        target_namespace TEXT NOT NULL,
        target_name TEXT NOT NULL,
        source_json TEXT NOT NULL,
        target_json TEXT NOT NULL,
        edge_type TEXT NOT NULL,
        transformation TEXT,
        description TEXT,
        metadata TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (source_namespace, source_name, target_namespace, target_name)
    );

    CREATE INDEX IF NOT EXISTS idx_edges_target
        ON lineage_edges(target_namespace, target_name);
";

pub(super) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(EVENTS_DDL)?;
    conn.execute_batch(EDGES_DDL)?;
    Ok(())
}
