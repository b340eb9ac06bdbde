//! Composition root
//!
//! `LineageService` wires one queue, one worker, one query engine and one
//! exporter around a shared store. Construct it once per process and hand
//! out [`LineageEmitter`] clones to producers.

use lineage_storage::{LineageEvent, LineageStore, StoreStats};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::LineageConfig;
use crate::emitter::{DatasetOperation, EmitterNamespaces, LineageEmitter};
use crate::error::Result;
use crate::openlineage::{OpenLineageExporter, RunEvent};
use crate::query::{ImpactReport, LineageNode, LineagePath, LineageQueryEngine, QueryOutcome};
use crate::stats::{IngestStats, StatsSnapshot};
use crate::worker::{BatchWorker, DeadLetterSink, WorkerSettings, WorkerState};

#[cfg(feature = "metrics")]
use crate::metrics::LineageMetrics;

pub struct LineageServiceBuilder {
    store: Arc<dyn LineageStore>,
    config: LineageConfig,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
    #[cfg(feature = "metrics")]
    registry: Option<prometheus::Registry>,
}

impl LineageServiceBuilder {
    pub fn config(mut self, config: LineageConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = Some(sink);
        self
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_registry(mut self, registry: prometheus::Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validate the config and wire the components. The worker is not
    /// started; call [`LineageService::start`].
    pub fn build(self) -> Result<LineageService> {
        self.config.validate()?;
        let config = self.config;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let stats = Arc::new(IngestStats::new());

        let emitter = LineageEmitter::new(
            tx,
            Arc::clone(&stats),
            EmitterNamespaces {
                etl: config.etl_namespace.clone(),
                scan: config.scan_namespace.clone(),
            },
        );
        let worker = BatchWorker::new(
            rx,
            Arc::clone(&self.store),
            Arc::clone(&stats),
            self.dead_letter,
            WorkerSettings {
                batch_size: config.batch_size,
                flush_interval: config.flush_interval(),
                stop_timeout: config.stop_timeout(),
            },
        );
        let queries = LineageQueryEngine::new(Arc::clone(&self.store), config.depth_limits());
        let exporter = OpenLineageExporter::new(Arc::clone(&self.store), &config);

        #[cfg(feature = "metrics")]
        let metrics = match &self.registry {
            Some(registry) => Some(LineageMetrics::new(registry)?),
            None => None,
        };

        Ok(LineageService {
            config,
            store: self.store,
            stats,
            emitter,
            worker,
            queries,
            exporter,
            #[cfg(feature = "metrics")]
            metrics,
        })
    }
}

pub struct LineageService {
    config: LineageConfig,
    store: Arc<dyn LineageStore>,
    stats: Arc<IngestStats>,
    emitter: LineageEmitter,
    worker: BatchWorker,
    queries: LineageQueryEngine,
    exporter: OpenLineageExporter,
    #[cfg(feature = "metrics")]
    metrics: Option<LineageMetrics>,
}

impl LineageService {
    pub fn builder(store: Arc<dyn LineageStore>) -> LineageServiceBuilder {
        LineageServiceBuilder {
            store,
            config: LineageConfig::default(),
            dead_letter: None,
            #[cfg(feature = "metrics")]
            registry: None,
        }
    }

    pub fn new(store: Arc<dyn LineageStore>, config: LineageConfig) -> Result<Self> {
        Self::builder(store).config(config).build()
    }

    pub fn config(&self) -> &LineageConfig {
        &self.config
    }

    /// Producer handle sharing this service's queue
    pub fn emitter(&self) -> LineageEmitter {
        self.emitter.clone()
    }

    pub fn query_engine(&self) -> &LineageQueryEngine {
        &self.queries
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════

    /// Spawn the batch worker on the current tokio runtime (idempotent)
    pub fn start(&self) -> Result<()> {
        self.worker.start()
    }

    /// Stop the worker and flush everything still queued (idempotent).
    ///
    /// The queue stays open afterwards: `emit_*` keeps accepting events,
    /// which wait in the queue until the next `start()` or `stop()`.
    pub async fn stop(&self) -> Result<()> {
        let result = self.worker.stop().await;
        let stats = self.get_stats();
        info!(
            persisted = stats.events_persisted,
            failed = stats.events_failed,
            "Lineage service stopped"
        );
        result
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Worker task is running
    pub fn health_check(&self) -> bool {
        self.worker.is_alive()
    }

    pub fn get_stats(&self) -> StatsSnapshot {
        let snapshot = self.stats.snapshot(self.emitter.queue_size());
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.observe(&snapshot);
        }
        snapshot
    }

    pub async fn store_stats(&self) -> QueryOutcome<StoreStats> {
        match self.store.get_stats().await {
            Ok(stats) => QueryOutcome::Found(stats),
            Err(e) => {
                warn!(error = %e, "Store stats unavailable");
                QueryOutcome::StoreUnavailable(e.to_string())
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Producer API
    // ═══════════════════════════════════════════════════════════════════════

    pub fn emit_event(&self, event: LineageEvent) -> bool {
        self.emitter.emit_event(event)
    }

    pub fn emit_batch(&self, events: impl IntoIterator<Item = LineageEvent>) -> usize {
        self.emitter.emit_batch(events)
    }

    pub fn emit_etl_event<S: AsRef<str>>(
        &self,
        job_name: &str,
        source_tables: &[S],
        target_tables: &[S],
        transformation: Option<&str>,
        run_id: Option<&str>,
    ) -> bool {
        self.emitter
            .emit_etl_event(job_name, source_tables, target_tables, transformation, run_id)
    }

    pub fn emit_scan_event<S: AsRef<str>>(
        &self,
        database: &str,
        tables_scanned: &[S],
        scan_id: Option<&str>,
    ) -> bool {
        self.emitter.emit_scan_event(database, tables_scanned, scan_id)
    }

    pub fn emit_dataset_operation(
        &self,
        operation: DatasetOperation,
        dataset_fqn: &str,
        column_name: Option<&str>,
        description: Option<&str>,
    ) -> bool {
        self.emitter
            .emit_dataset_operation(operation, dataset_fqn, column_name, description)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Query API
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn get_upstream(
        &self,
        namespace: &str,
        name: &str,
        max_depth: Option<usize>,
    ) -> QueryOutcome<Vec<LineageNode>> {
        self.queries.get_upstream(namespace, name, max_depth).await
    }

    pub async fn get_downstream(
        &self,
        namespace: &str,
        name: &str,
        max_depth: Option<usize>,
    ) -> QueryOutcome<Vec<LineageNode>> {
        self.queries.get_downstream(namespace, name, max_depth).await
    }

    pub async fn get_path(
        &self,
        source_namespace: &str,
        source_name: &str,
        target_namespace: &str,
        target_name: &str,
        max_depth: Option<usize>,
    ) -> QueryOutcome<LineagePath> {
        self.queries
            .get_path(source_namespace, source_name, target_namespace, target_name, max_depth)
            .await
    }

    pub async fn get_impact_analysis(
        &self,
        namespace: &str,
        name: &str,
        max_depth: Option<usize>,
    ) -> QueryOutcome<ImpactReport> {
        self.queries.get_impact_analysis(namespace, name, max_depth).await
    }

    pub async fn get_recent_events(&self, limit: usize) -> QueryOutcome<Vec<LineageEvent>> {
        self.queries.get_recent_events(limit).await
    }

    pub async fn get_job_history(&self, job_name: &str, limit: usize) -> QueryOutcome<Vec<LineageEvent>> {
        self.queries.get_job_history(job_name, limit).await
    }

    pub async fn to_openlineage_events(&self, limit: usize) -> QueryOutcome<Vec<RunEvent>> {
        self.exporter.to_openlineage_events(limit).await
    }
}
