/// End-to-end ingestion: emit → queue → worker → store → queries
use async_trait::async_trait;
use lineage_service::lineage_storage::{
    self, BatchCommit, DatasetIdentifier, EventSource, EventType, InMemoryLineageStore,
    LineageEdge, LineageEvent, LineageStore, SqliteLineageStore, StoreStats,
};
use lineage_service::{
    DatasetOperation, DeadLetterSink, LineageConfig, LineageError, LineageService, Preset,
    QueryOutcome, WorkerState,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// In-memory store whose batch commits take `delay` to complete
#[derive(Clone)]
struct SlowStore {
    inner: InMemoryLineageStore,
    delay: Duration,
    commits_started: Arc<AtomicUsize>,
}

impl SlowStore {
    fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryLineageStore::new(),
            delay,
            commits_started: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn commits_started(&self) -> usize {
        self.commits_started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LineageStore for SlowStore {
    async fn insert_events(&self, events: &[LineageEvent]) -> lineage_storage::Result<usize> {
        self.inner.insert_events(events).await
    }

    async fn upsert_edges(&self, edges: &[LineageEdge]) -> lineage_storage::Result<usize> {
        self.inner.upsert_edges(edges).await
    }

    async fn commit_batch(
        &self,
        events: &[LineageEvent],
        edges: &[LineageEdge],
    ) -> lineage_storage::Result<BatchCommit> {
        self.commits_started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.commit_batch(events, edges).await
    }

    async fn find_edges_by_source(
        &self,
        namespace: &str,
        name: &str,
    ) -> lineage_storage::Result<Vec<LineageEdge>> {
        self.inner.find_edges_by_source(namespace, name).await
    }

    async fn find_edges_by_target(
        &self,
        namespace: &str,
        name: &str,
    ) -> lineage_storage::Result<Vec<LineageEdge>> {
        self.inner.find_edges_by_target(namespace, name).await
    }

    async fn find_recent_events(&self, limit: usize) -> lineage_storage::Result<Vec<LineageEvent>> {
        self.inner.find_recent_events(limit).await
    }

    async fn find_events_by_job(
        &self,
        job_name: &str,
        limit: usize,
    ) -> lineage_storage::Result<Vec<LineageEvent>> {
        self.inner.find_events_by_job(job_name, limit).await
    }

    async fn get_stats(&self) -> lineage_storage::Result<StoreStats> {
        self.inner.get_stats().await
    }
}

fn config(queue_capacity: usize, batch_size: usize, flush_interval_ms: u64) -> LineageConfig {
    let mut config = LineageConfig::preset(Preset::LowLatency);
    config.queue_capacity = queue_capacity;
    config.batch_size = batch_size;
    config.flush_interval_ms = flush_interval_ms;
    config
}

fn service_on(store: &InMemoryLineageStore, config: LineageConfig) -> LineageService {
    LineageService::new(Arc::new(store.clone()), config).unwrap()
}

async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

fn job_event(id: usize) -> LineageEvent {
    LineageEvent::builder(EventType::JobCompleted, EventSource::Etl)
        .event_id(format!("evt-{}", id))
        .input(DatasetIdentifier::table("db", "raw").unwrap())
        .output(DatasetIdentifier::table("db", format!("out_{}", id)).unwrap())
        .build()
}

#[tokio::test]
async fn test_etl_event_produces_edge_and_downstream() {
    let store = InMemoryLineageStore::new();
    let service = service_on(&store, config(100, 10, 60_000));
    service.start().unwrap();

    assert!(service.emit_etl_event("etl1", &["db.orders"], &["db.orders_clean"], None, None));
    service.stop().await.unwrap();

    let edges = store.find_edges_by_source("db", "orders").await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target.fqn(), "db.orders_clean");

    let downstream = service
        .get_downstream("db", "orders", Some(1))
        .await
        .into_option()
        .unwrap();
    assert_eq!(downstream.len(), 1);
    assert_eq!(downstream[0].fqn, "db.orders_clean");
    assert_eq!(downstream[0].depth, 1);
}

#[tokio::test]
async fn test_recent_events_reverse_emission_order() {
    let store = InMemoryLineageStore::new();
    let service = service_on(&store, config(100, 3, 60_000));
    service.start().unwrap();

    for i in 0..7 {
        assert!(service.emit_event(job_event(i)));
    }
    service.stop().await.unwrap();

    let ids: Vec<String> = service
        .get_recent_events(7)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|e| e.event_id)
        .collect();
    let expected: Vec<String> = (0..7).rev().map(|i| format!("evt-{}", i)).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_stop_drains_everything_emitted_before_it() {
    let store = InMemoryLineageStore::new();
    let service = service_on(&store, config(100, 50, 60_000));
    service.start().unwrap();

    assert_eq!(service.emit_batch((0..5).map(job_event)), 5);
    service.stop().await.unwrap();

    let recent = service.get_recent_events(5).await.unwrap_or_default();
    assert_eq!(recent.len(), 5);
    assert_eq!(service.get_stats().events_persisted, 5);
    assert_eq!(service.get_stats().queue_size, 0);
}

#[tokio::test]
async fn test_stop_is_idempotent_and_restartable() {
    let store = InMemoryLineageStore::new();
    let service = service_on(&store, config(100, 50, 60_000));

    service.stop().await.unwrap();
    service.start().unwrap();
    service.stop().await.unwrap();
    service.stop().await.unwrap();

    service.start().unwrap();
    assert!(service.emit_event(job_event(1)));
    service.stop().await.unwrap();
    assert_eq!(service.get_stats().events_persisted, 1);
}

#[tokio::test]
async fn test_concurrent_stop_waits_for_drain() {
    let store = SlowStore::new(Duration::from_millis(300));
    let service = Arc::new(
        LineageService::new(Arc::new(store.clone()), config(100, 10, 60_000)).unwrap(),
    );
    assert_eq!(service.emit_batch((0..5).map(job_event)), 5);

    let first = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.stop().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(service.worker_state(), WorkerState::Stopping);

    service.stop().await.unwrap();
    assert_eq!(service.get_stats().events_persisted, 5);
    assert_eq!(service.worker_state(), WorkerState::Stopped);

    first.await.unwrap().unwrap();
    assert_eq!(store.commits_started(), 1);
}

#[tokio::test]
async fn test_stop_timeout_still_drains_queue() {
    let store = SlowStore::new(Duration::from_millis(400));
    let mut config = config(100, 1, 60_000);
    config.stop_timeout_ms = 50;
    let service = LineageService::new(Arc::new(store.clone()), config).unwrap();
    service.start().unwrap();

    // Worker is now stuck inside the first commit
    assert!(service.emit_event(job_event(0)));
    assert!(wait_for(|| store.commits_started() == 1).await);
    assert!(service.emit_event(job_event(1)));
    assert!(service.emit_event(job_event(2)));

    let err = service.stop().await.unwrap_err();
    assert!(
        matches!(err, LineageError::StopTimeout(timeout) if timeout == Duration::from_millis(50)),
        "unexpected error: {err}"
    );
    assert_eq!(err.category().to_string(), "infrastructure");
    assert_eq!(service.worker_state(), WorkerState::Stopped);

    let stats = service.get_stats();
    assert_eq!(stats.queue_size, 0);
    assert_eq!(stats.events_failed, 0);
    assert_eq!(stats.events_persisted, 3);

    let mut ids: Vec<String> = service
        .get_recent_events(10)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|e| e.event_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["evt-0", "evt-1", "evt-2"]);
}

#[tokio::test]
async fn test_backpressure_when_worker_paused() {
    let store = InMemoryLineageStore::new();
    let capacity = 8;
    let service = service_on(&store, config(capacity, 4, 60_000));

    let accepted: Vec<bool> = (0..=capacity).map(|i| service.emit_event(job_event(i))).collect();
    assert!(accepted.iter().any(|ok| !ok));

    let stats = service.get_stats();
    assert_eq!(stats.events_received, capacity as u64);
    assert_eq!(stats.events_failed, 1);
    assert_eq!(stats.queue_size, capacity);

    service.stop().await.unwrap();
    assert_eq!(service.get_stats().events_persisted, capacity as u64);
}

#[tokio::test]
async fn test_time_triggered_flush() {
    let store = InMemoryLineageStore::new();
    let service = service_on(&store, config(100, 100, 50));
    service.start().unwrap();

    assert!(service.emit_event(job_event(1)));
    assert!(wait_for(|| service.get_stats().events_persisted == 1).await);
    assert!(service.health_check());

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_size_triggered_flush_before_interval() {
    let store = InMemoryLineageStore::new();
    let service = service_on(&store, config(100, 4, 3_600_000));
    service.start().unwrap();

    assert_eq!(service.emit_batch((0..4).map(job_event)), 4);
    assert!(wait_for(|| service.get_stats().events_persisted == 4).await);

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_reflushed_batch_duplicates_events_not_edges() {
    let store = InMemoryLineageStore::new();
    let service = service_on(&store, config(100, 10, 60_000));
    let batch: Vec<LineageEvent> = (0..3).map(job_event).collect();

    assert_eq!(service.emit_batch(batch.clone()), 3);
    service.stop().await.unwrap();
    let edges_after_first = store.get_stats().await.unwrap().edge_count;

    assert_eq!(service.emit_batch(batch), 3);
    service.stop().await.unwrap();

    let stats = store.get_stats().await.unwrap();
    assert_eq!(edges_after_first, 3);
    assert_eq!(stats.edge_count, 3);
    assert_eq!(stats.event_count, 6);
    assert_eq!(service.get_stats().edges_created, 3);
}

#[tokio::test]
async fn test_failed_flush_is_discarded_and_counted() {
    struct Recorder(Mutex<Vec<(usize, String)>>);
    impl DeadLetterSink for Recorder {
        fn on_discarded(&self, events: &[LineageEvent], error: &LineageError) {
            self.0.lock().push((events.len(), error.category().to_string()));
        }
    }

    let store = InMemoryLineageStore::new();
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    let service = LineageService::builder(Arc::new(store.clone()))
        .config(config(100, 10, 60_000))
        .dead_letter(recorder.clone())
        .build()
        .unwrap();

    store.simulate_outage(true);
    assert_eq!(service.emit_batch((0..3).map(job_event)), 3);
    service.stop().await.unwrap();

    let stats = service.get_stats();
    assert_eq!(stats.events_failed, 3);
    assert_eq!(stats.events_persisted, 0);
    assert_eq!(*recorder.0.lock(), vec![(3, "transient".to_string())]);

    store.simulate_outage(false);
    assert!(service.get_recent_events(10).await.is_not_found());
}

#[tokio::test]
async fn test_reads_report_store_outage() {
    let store = InMemoryLineageStore::new();
    let service = service_on(&store, LineageConfig::default());
    store.simulate_outage(true);

    let outcome = service.get_downstream("db", "orders", None).await;
    assert!(matches!(outcome, QueryOutcome::StoreUnavailable(_)));
    assert!(service.get_job_history("etl1", 10).await.is_unavailable());
    assert!(service.store_stats().await.is_unavailable());
}

#[tokio::test]
async fn test_convenience_emitters_end_to_end() {
    let store = InMemoryLineageStore::new();
    let service = service_on(&store, LineageConfig::default());

    assert!(service.emit_scan_event("warehouse", &["orders", "customers"], Some("scan-1")));
    assert!(service.emit_dataset_operation(
        DatasetOperation::Masked,
        "warehouse.customers",
        Some("email"),
        None
    ));
    assert!(service.emit_etl_event(
        "nightly",
        &["warehouse.orders", "warehouse.customers"],
        &["mart.order_facts"],
        Some("join"),
        Some("run-1"),
    ));
    assert!(!service.emit_etl_event("nightly", &["not_qualified"], &["mart.x"], None, None));
    service.stop().await.unwrap();

    let stats = service.get_stats();
    assert_eq!(stats.events_received, 3);
    assert_eq!(stats.events_persisted, 3);
    assert_eq!(stats.events_failed, 1);
    assert_eq!(stats.edges_created, 2);

    let history = service.get_job_history("nightly", 10).await.unwrap_or_default();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].run_id.as_deref(), Some("run-1"));

    let upstream = service
        .get_upstream("mart", "order_facts", None)
        .await
        .into_option()
        .unwrap();
    assert_eq!(upstream.len(), 2);
    assert!(upstream.iter().all(|n| n.transformation.as_deref() == Some("join")));

    let exported = service.to_openlineage_events(10).await.into_option().unwrap();
    assert_eq!(exported.len(), 3);
    assert_eq!(exported[0].job.name, "nightly");
    assert_eq!(exported[0].inputs.len(), 2);
}

#[tokio::test]
async fn test_sqlite_backed_service_persists_across_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lineage.db");

    {
        let store = Arc::new(SqliteLineageStore::new(&path).unwrap());
        let service = LineageService::new(store, config(100, 2, 60_000)).unwrap();
        service.start().unwrap();
        assert!(service.emit_etl_event("etl1", &["db.a"], &["db.b"], None, None));
        assert!(service.emit_etl_event("etl2", &["db.b"], &["db.c"], None, None));
        assert!(service.emit_etl_event("etl3", &["db.c"], &["db.d"], None, None));
        service.stop().await.unwrap();
    }

    let store = Arc::new(SqliteLineageStore::new(&path).unwrap());
    let service = LineageService::new(store, LineageConfig::default()).unwrap();

    let lineage = service
        .get_path("db", "a", "db", "d", None)
        .await
        .into_option()
        .unwrap();
    assert_eq!(lineage.nodes, vec!["db.a", "db.b", "db.c", "db.d"]);
    assert_eq!(service.get_recent_events(10).await.unwrap_or_default().len(), 3);
}
