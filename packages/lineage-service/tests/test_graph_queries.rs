/// Graph query properties over a store populated through real flushes
use lineage_service::lineage_storage::{InMemoryLineageStore, LineageStore};
use lineage_service::{LineageConfig, LineageService, QueryOutcome};
use std::collections::HashSet;
use std::sync::Arc;

/// ```text
/// raw.orders ──► stg.orders ──► mart.revenue ──► bi.dashboard
///      │                            ▲
///      └──────► stg.payments ───────┘
/// raw.customers ──► stg.customers ──► mart.revenue
/// ```
async fn warehouse() -> (LineageService, InMemoryLineageStore) {
    let store = InMemoryLineageStore::new();
    let service = LineageService::new(Arc::new(store.clone()), LineageConfig::default()).unwrap();

    let jobs: [(&str, &[&str], &[&str]); 5] = [
        ("stage_orders", &["raw.orders"], &["stg.orders", "stg.payments"]),
        ("stage_customers", &["raw.customers"], &["stg.customers"]),
        (
            "revenue",
            &["stg.orders", "stg.payments", "stg.customers"],
            &["mart.revenue"],
        ),
        ("dashboard", &["mart.revenue"], &["bi.dashboard"]),
        ("backfill", &["stg.payments"], &["mart.revenue"]),
    ];
    for (job, inputs, outputs) in jobs {
        assert!(service.emit_etl_event(job, inputs, outputs, Some(job), None));
    }
    service.stop().await.unwrap();
    (service, store)
}

fn fqns(outcome: QueryOutcome<Vec<lineage_service::LineageNode>>) -> Vec<(String, usize)> {
    outcome
        .unwrap_or_default()
        .into_iter()
        .map(|n| (n.fqn, n.depth))
        .collect()
}

#[tokio::test]
async fn test_every_edge_is_symmetric() {
    let (service, store) = warehouse().await;

    for dataset in ["raw.orders", "raw.customers", "stg.orders", "stg.payments", "mart.revenue"] {
        let (namespace, name) = dataset.split_once('.').unwrap();
        for edge in store.find_edges_by_source(namespace, name).await.unwrap() {
            let downstream = fqns(service.get_downstream(namespace, name, Some(1)).await);
            assert!(downstream.iter().any(|(fqn, _)| *fqn == edge.target.fqn()));

            let upstream = fqns(
                service
                    .get_upstream(edge.target.namespace(), edge.target.name(), Some(1))
                    .await,
            );
            assert!(upstream.iter().any(|(fqn, _)| fqn == dataset));
        }
    }
}

#[tokio::test]
async fn test_depth_bound_holds_for_every_depth() {
    let (service, _) = warehouse().await;

    for max_depth in 0..5 {
        for (fqn, depth) in fqns(service.get_downstream("raw", "orders", Some(max_depth)).await) {
            assert!(depth <= max_depth, "{fqn} at depth {depth} > {max_depth}");
        }
        for (fqn, depth) in fqns(service.get_upstream("bi", "dashboard", Some(max_depth)).await) {
            assert!(depth <= max_depth, "{fqn} at depth {depth} > {max_depth}");
        }
    }
}

#[tokio::test]
async fn test_upstream_of_dashboard() {
    let (service, _) = warehouse().await;

    let upstream = fqns(service.get_upstream("bi", "dashboard", Some(10)).await);
    let unique: HashSet<&String> = upstream.iter().map(|(f, _)| f).collect();
    assert_eq!(unique.len(), upstream.len(), "no node is reported twice");

    assert_eq!(upstream[0], ("mart.revenue".to_string(), 1));
    let depth_of = |fqn: &str| upstream.iter().find(|(f, _)| f == fqn).map(|(_, d)| *d);
    assert_eq!(depth_of("stg.payments"), Some(2));
    assert_eq!(depth_of("raw.orders"), Some(3));
    assert_eq!(depth_of("raw.customers"), Some(3));
    assert_eq!(upstream.len(), 6);
}

#[tokio::test]
async fn test_path_edges_exist() {
    let (service, store) = warehouse().await;

    let path = service
        .get_path("raw", "orders", "bi", "dashboard", None)
        .await
        .into_option()
        .unwrap();
    assert_eq!(path.source(), Some("raw.orders"));
    assert_eq!(path.target(), Some("bi.dashboard"));
    assert_eq!(path.len(), 3);

    for pair in path.nodes.windows(2) {
        let (namespace, name) = pair[0].split_once('.').unwrap();
        let edges = store.find_edges_by_source(namespace, name).await.unwrap();
        assert!(
            edges.iter().any(|e| e.target.fqn() == pair[1]),
            "missing edge {} -> {}",
            pair[0],
            pair[1]
        );
    }

    assert!(service
        .get_path("raw", "orders", "bi", "dashboard", Some(2))
        .await
        .is_not_found());
    assert!(service
        .get_path("raw", "orders", "raw", "customers", None)
        .await
        .is_not_found());
}

#[tokio::test]
async fn test_impact_of_raw_orders() {
    let (service, _) = warehouse().await;

    let report = service
        .get_impact_analysis("raw", "orders", None)
        .await
        .into_option()
        .unwrap();
    assert_eq!(report.dataset, "raw.orders");
    assert_eq!(report.total_impacted, 4);
    let direct: Vec<&str> = report.direct_downstream.iter().map(|n| n.fqn.as_str()).collect();
    assert_eq!(direct, vec!["stg.orders", "stg.payments"]);
    assert_eq!(report.by_depth.get(&2), Some(&1));
    assert_eq!(report.by_depth.get(&3), Some(&1));
    assert_eq!(report.max_depth_reached(), 3);
}

#[tokio::test]
async fn test_latest_event_wins_edge_annotation() {
    let (service, store) = warehouse().await;

    let before = store.find_edges_by_source("stg", "payments").await.unwrap();
    let revenue = before.iter().find(|e| e.target.fqn() == "mart.revenue").unwrap();
    assert_eq!(revenue.transformation.as_deref(), Some("revenue"));

    assert!(service.emit_etl_event(
        "revenue_v2",
        &["stg.payments"],
        &["mart.revenue"],
        Some("revenue v2"),
        None
    ));
    service.stop().await.unwrap();

    let after = store.find_edges_by_source("stg", "payments").await.unwrap();
    let revenue = after.iter().find(|e| e.target.fqn() == "mart.revenue").unwrap();
    assert_eq!(revenue.transformation.as_deref(), Some("revenue v2"));
    assert_eq!(after.len(), before.len());
}
