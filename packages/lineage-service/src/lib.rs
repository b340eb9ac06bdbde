/*
 * Lineage Service - event ingestion and graph queries for data lineage
 *
 * Producers emit lineage events without blocking; a single background
 * worker batches them into the store and derives dataset edges; the query
 * engine walks those edges on demand.
 *
 * Architecture:
 * - Emitter (bounded tokio mpsc queue, non-blocking try_send)
 * - Batch Worker (size/time triggered flush, drain on stop)
 * - Edge Deriver (per-batch dedup by edge key)
 * - Query Engine (level-bounded BFS: upstream, downstream, path, impact)
 * - OpenLineage Exporter
 */

// Public modules
pub mod config;
pub mod deriver;
pub mod emitter;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod openlineage;
pub mod query;
pub mod service;
pub mod stats;
pub mod telemetry;
pub mod worker;

// Re-exports
pub use config::{ConfigError, LineageConfig, LineageConfigPatch, Preset};
pub use deriver::derive_edges;
pub use emitter::{DatasetOperation, LineageEmitter};
pub use error::{ErrorCategory, LineageError, Result};
#[cfg(feature = "metrics")]
pub use metrics::LineageMetrics;
pub use openlineage::{OpenLineageExporter, RunEvent, RunState};
pub use query::{
    Direction, ImpactReport, LineageNode, LineagePath, LineageQueryEngine, QueryOutcome,
};
pub use service::{LineageService, LineageServiceBuilder};
pub use stats::StatsSnapshot;
pub use telemetry::init_tracing;
pub use worker::{BatchWorker, DeadLetterSink, WorkerState};

pub use lineage_storage;
