//! End-to-end flow: ingest raw batches through the service, classify, and
//! check the partition against the session-scoped stores.

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::mpsc;

use wtb_monitor::compare::Classifier;
use wtb_monitor::db::{ObservationStore, SessionStore};
use wtb_monitor::ingest::{IngestService, RawInventoryItem, RawWtbItem};
use wtb_monitor::state::{ResultCache, StatusBoard};
use wtb_monitor::types::SourceKind;

async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

fn service(pool: SqlitePool) -> (IngestService, Arc<ResultCache>) {
    let status = Arc::new(StatusBoard::new());
    let cache = Arc::new(ResultCache::new());
    let (tx, mut rx) = mpsc::channel(64);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });
    (
        IngestService::new(pool, status, Arc::clone(&cache), tx),
        cache,
    )
}

fn wtb(name: &str, sku: Option<&str>, store: &str) -> RawWtbItem {
    RawWtbItem {
        name: Some(name.to_string()),
        sku: sku.map(str::to_string),
        origin_store: Some(store.to_string()),
        ..RawWtbItem::default()
    }
}

fn inventory(name: &str, sku: Option<&str>) -> RawInventoryItem {
    RawInventoryItem {
        name: Some(name.to_string()),
        sku: sku.map(str::to_string),
        price: Some(serde_json::json!(99.5)),
        ..RawInventoryItem::default()
    }
}

#[tokio::test]
async fn full_flow_partitions_demand_and_inventory() {
    let pool = pool().await;
    let (svc, _cache) = service(pool.clone());
    let classifier = Classifier::new(pool);

    // Two raw rows for one product (SKU'd + bare), one typo'd product, one
    // product nobody stocks.
    svc.ingest_wtb(
        Some("marketplace".to_string()),
        vec![
            wtb("Air Zoom 1", Some("ABC-100"), "X"),
            wtb("Air Zoom 1", None, "Y"),
            wtb("Air Max 90 Infrared", None, "X"),
            wtb("Ghost Grail", None, "Z"),
        ],
    )
    .await
    .unwrap();

    svc.ingest_inventory(
        Some("my-shop".to_string()),
        vec![
            inventory("Air Zoom 1", Some("abc-100")),
            inventory("Air Max 90 Infared", None),
            inventory("Shelf Warmer", None),
        ],
    )
    .await
    .unwrap();

    let result = classifier.classify(None, None).await.unwrap();

    // Demand side: 3 records from 4 raw rows; Air Zoom folds to one.
    assert_eq!(result.summary.total_wtb_items, 3);
    assert_eq!(result.summary.total_raw_wtb_rows, 4);

    // Partition completeness on both sides.
    assert_eq!(result.missing.len() + result.in_stock.len(), 3);
    assert_eq!(result.in_stock.len() + result.no_demand.len(), 3);

    // Air Zoom matched by SKU (case-insensitive), the typo fuzzily.
    assert_eq!(result.in_stock.len(), 2);
    let zoom = result
        .in_stock
        .iter()
        .find(|e| e.wtb_name == "Air Zoom 1")
        .unwrap();
    assert_eq!(zoom.demand_count, 2);
    assert_eq!(zoom.stores_wanting, vec!["X", "Y"]);
    assert_eq!(zoom.match_confidence, 1.0);
    assert_eq!(zoom.my_product_price, Some(99.5));

    let typo = result
        .in_stock
        .iter()
        .find(|e| e.wtb_name == "Air Max 90 Infrared")
        .unwrap();
    assert!(typo.match_confidence >= 0.75 && typo.match_confidence < 1.0);
    assert_eq!(typo.my_product_name, "Air Max 90 Infared");

    assert_eq!(result.missing.len(), 1);
    assert_eq!(result.missing[0].wtb_name, "Ghost Grail");

    assert_eq!(result.no_demand.len(), 1);
    assert_eq!(result.no_demand[0].my_product_name, "Shelf Warmer");

    // Session provenance is reported.
    assert!(result.summary.wtb_session_id.is_some());
    assert!(result.summary.inventory_session_id.is_some());
}

#[tokio::test]
async fn missing_inventory_session_degrades_to_all_missing() {
    let pool = pool().await;
    let (svc, _cache) = service(pool.clone());
    let classifier = Classifier::new(pool);

    svc.ingest_wtb(None, vec![wtb("Air Max 90", None, "X")])
        .await
        .unwrap();

    let result = classifier.classify(None, None).await.unwrap();
    assert_eq!(result.missing.len(), 1);
    assert!(result.in_stock.is_empty());
    assert!(result.no_demand.is_empty());
    assert_eq!(result.summary.inventory_session_id, None);
}

#[tokio::test]
async fn no_sessions_at_all_yields_an_empty_result() {
    let pool = pool().await;
    let classifier = Classifier::new(pool);

    let result = classifier.classify(None, None).await.unwrap();
    assert!(result.missing.is_empty());
    assert!(result.in_stock.is_empty());
    assert!(result.no_demand.is_empty());
    assert_eq!(result.summary.total_wtb_items, 0);
    assert_eq!(result.summary.total_my_products, 0);
}

#[tokio::test]
async fn explicit_session_ids_override_latest() {
    let pool = pool().await;
    let (svc, _cache) = service(pool.clone());
    let classifier = Classifier::new(pool);

    let first = svc
        .ingest_wtb(None, vec![wtb("Old Wave Runner", None, "X")])
        .await
        .unwrap();
    svc.ingest_wtb(None, vec![wtb("Fresh Drop", None, "Y")])
        .await
        .unwrap();

    // Default picks the newest session.
    let latest = classifier.classify(None, None).await.unwrap();
    assert_eq!(latest.missing[0].wtb_name, "Fresh Drop");

    // Pinning the first session reproduces the older view.
    let pinned = classifier
        .classify(Some(first.session_id.as_str()), None)
        .await
        .unwrap();
    assert_eq!(pinned.missing[0].wtb_name, "Old Wave Runner");
    assert_eq!(pinned.summary.wtb_session_id, Some(first.session_id));
}

#[tokio::test]
async fn incomplete_sessions_are_invisible_to_classification() {
    let pool = pool().await;
    let sessions = SessionStore::new(pool.clone());
    let observations = ObservationStore::new(pool.clone());
    let classifier = Classifier::new(pool);

    // Simulate an ingest that appended rows but died before completion.
    let s = sessions.create(SourceKind::Wtb, None).await.unwrap();
    observations
        .append_wtb(
            &s.id,
            &{
                let (items, _) =
                    wtb_monitor::ingest::service::validate_wtb(vec![wtb("Half Written", None, "X")]);
                items
            },
        )
        .await
        .unwrap();

    let result = classifier.classify(None, None).await.unwrap();
    assert!(result.missing.is_empty());
    assert_eq!(result.summary.wtb_session_id, None);

    // An explicit reference to the incomplete session degrades the same way.
    let explicit = classifier.classify(Some(&s.id), None).await.unwrap();
    assert!(explicit.missing.is_empty());
}

#[tokio::test]
async fn unknown_explicit_session_id_is_not_an_error() {
    let pool = pool().await;
    let classifier = Classifier::new(pool);

    let result = classifier
        .classify(Some("wtb-0000000000000-ffffff"), None)
        .await
        .unwrap();
    assert!(result.missing.is_empty());
    assert_eq!(result.summary.wtb_session_id, None);
}
