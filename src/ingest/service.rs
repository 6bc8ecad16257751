use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::db::{ObservationStore, SessionStore};
use crate::error::{AppError, Result};
use crate::ingest::csv::parse_rows;
use crate::ingest::events::{emit, ProgressEvent};
use crate::state::{ResultCache, StatusBoard};
use crate::types::{NewInventoryObservation, NewWtbObservation, SourceKind};

// ---------------------------------------------------------------------------
// Raw item shapes — the untyped boundary
// ---------------------------------------------------------------------------

/// A WTB item as it arrives from a scraper or API client: every field
/// optional, prices possibly strings. Validation and coercion into the typed
/// observation shape happens before anything touches the stores; items
/// without a usable name are rejected there, since the aggregator assumes
/// every stored observation has one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawWtbItem {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub brand: Option<String>,
    pub size: Option<String>,
    pub price_min: Option<Value>,
    pub price_max: Option<Value>,
    pub origin_store: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawInventoryItem {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub brand: Option<String>,
    /// Either a JSON array of labels or a `;`-separated string.
    pub sizes: Option<Value>,
    pub price: Option<Value>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

fn clean(v: Option<String>) -> Option<String> {
    v.and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn coerce_price(v: Option<Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_sizes(v: Option<Value>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |label: &str| {
        let t = label.trim();
        if !t.is_empty() && !out.iter().any(|s| s == t) {
            out.push(t.to_string());
        }
    };
    match v {
        Some(Value::Array(items)) => {
            for item in &items {
                if let Value::String(s) = item {
                    push(s);
                }
            }
        }
        Some(Value::String(s)) => {
            for part in s.split(';') {
                push(part);
            }
        }
        _ => {}
    }
    out
}

/// Coerce raw WTB items into typed observations; returns the rejected count.
pub fn validate_wtb(raw: Vec<RawWtbItem>) -> (Vec<NewWtbObservation>, u64) {
    let mut items = Vec::with_capacity(raw.len());
    let mut rejected = 0u64;
    for r in raw {
        let Some(name) = clean(r.name) else {
            rejected += 1;
            continue;
        };
        items.push(NewWtbObservation {
            name,
            sku: clean(r.sku),
            brand: clean(r.brand),
            size: clean(r.size),
            price_min: coerce_price(r.price_min),
            price_max: coerce_price(r.price_max),
            origin_store: clean(r.origin_store),
            image_url: clean(r.image_url),
        });
    }
    (items, rejected)
}

/// Coerce raw inventory items; returns the rejected count.
pub fn validate_inventory(raw: Vec<RawInventoryItem>) -> (Vec<NewInventoryObservation>, u64) {
    let mut items = Vec::with_capacity(raw.len());
    let mut rejected = 0u64;
    for r in raw {
        let Some(name) = clean(r.name) else {
            rejected += 1;
            continue;
        };
        items.push(NewInventoryObservation {
            name,
            sku: clean(r.sku),
            brand: clean(r.brand),
            sizes: coerce_sizes(r.sizes),
            price: coerce_price(r.price),
            url: clean(r.url),
            image_url: clean(r.image_url),
        });
    }
    (items, rejected)
}

// ---------------------------------------------------------------------------
// Ingest service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub session_id: String,
    pub accepted: u64,
    pub rejected: u64,
}

/// Runs the full ingest lifecycle: claim the running flag, create a session,
/// append (all-or-nothing), complete the session, invalidate the result
/// cache. A failure anywhere leaves the session incomplete and therefore
/// invisible to `latest_completed`, so readers never observe half-written
/// data. Cache invalidation strictly follows the durable completion write.
pub struct IngestService {
    sessions: SessionStore,
    observations: ObservationStore,
    status: Arc<StatusBoard>,
    cache: Arc<ResultCache>,
    progress: mpsc::Sender<ProgressEvent>,
}

impl IngestService {
    pub fn new(
        pool: sqlx::SqlitePool,
        status: Arc<StatusBoard>,
        cache: Arc<ResultCache>,
        progress: mpsc::Sender<ProgressEvent>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(pool.clone()),
            observations: ObservationStore::new(pool),
            status,
            cache,
            progress,
        }
    }

    pub async fn ingest_wtb(
        &self,
        origin_label: Option<String>,
        raw: Vec<RawWtbItem>,
    ) -> Result<IngestOutcome> {
        self.status.try_begin(SourceKind::Wtb)?;
        let outcome = self.run(SourceKind::Wtb, origin_label, Payload::Wtb(raw)).await;
        self.finish(SourceKind::Wtb, "listings", &outcome);
        outcome
    }

    pub async fn ingest_inventory(
        &self,
        origin_label: Option<String>,
        raw: Vec<RawInventoryItem>,
    ) -> Result<IngestOutcome> {
        self.status.try_begin(SourceKind::Inventory)?;
        let outcome = self
            .run(SourceKind::Inventory, origin_label, Payload::Inventory(raw))
            .await;
        self.finish(SourceKind::Inventory, "products", &outcome);
        outcome
    }

    /// Parse a CSV body (header row required) and ingest it as an inventory
    /// session labeled `csv-import`.
    pub async fn import_inventory_csv(&self, body: &str) -> Result<IngestOutcome> {
        let raw = csv_to_inventory_items(body)?;
        self.ingest_inventory(Some("csv-import".to_string()), raw).await
    }

    async fn run(
        &self,
        kind: SourceKind,
        origin_label: Option<String>,
        payload: Payload,
    ) -> Result<IngestOutcome> {
        emit(&self.progress, ProgressEvent::Started {
            kind,
            origin_label: origin_label.clone(),
        });

        let total = payload.len();
        let session = self.sessions.create(kind, origin_label.as_deref()).await?;

        // An append that fails here leaves the session incomplete; readers
        // never see it.
        let (accepted, rejected) = match payload {
            Payload::Wtb(raw) => {
                let (items, rejected) = validate_wtb(raw);
                let written = self
                    .observations
                    .append_wtb(&session.id, &items)
                    .await
                    .map_err(|e| AppError::Ingestion(e.to_string()))?;
                (written, rejected)
            }
            Payload::Inventory(raw) => {
                let (items, rejected) = validate_inventory(raw);
                let written = self
                    .observations
                    .append_inventory(&session.id, &items)
                    .await
                    .map_err(|e| AppError::Ingestion(e.to_string()))?;
                (written, rejected)
            }
        };

        emit(&self.progress, ProgressEvent::Progress {
            kind,
            message: format!("Stored {accepted} of {total} items"),
        });

        self.sessions.complete(&session.id, accepted as i64).await?;
        // Only after completion is durable may readers see fresh data.
        self.cache.invalidate();

        Ok(IngestOutcome { session_id: session.id, accepted, rejected })
    }

    fn finish(&self, kind: SourceKind, noun: &str, outcome: &Result<IngestOutcome>) {
        match outcome {
            Ok(o) => {
                self.status
                    .complete(kind, o.accepted, &format!("Done: {} {noun}", o.accepted));
                emit(&self.progress, ProgressEvent::Completed {
                    kind,
                    session_id: o.session_id.clone(),
                    accepted: o.accepted,
                    rejected: o.rejected,
                });
                info!(
                    kind = %kind,
                    session_id = %o.session_id,
                    accepted = o.accepted,
                    rejected = o.rejected,
                    "Ingest complete"
                );
            }
            Err(e) => {
                self.status.fail(kind, &e.to_string());
                emit(&self.progress, ProgressEvent::Failed {
                    kind,
                    error: e.to_string(),
                });
                error!(kind = %kind, "Ingest failed: {e}");
            }
        }
    }
}

enum Payload {
    Wtb(Vec<RawWtbItem>),
    Inventory(Vec<RawInventoryItem>),
}

impl Payload {
    fn len(&self) -> usize {
        match self {
            Payload::Wtb(v) => v.len(),
            Payload::Inventory(v) => v.len(),
        }
    }
}

/// Map parsed CSV rows onto raw inventory items by header name. Unknown
/// columns are ignored; `name` is required.
fn csv_to_inventory_items(text: &str) -> Result<Vec<RawInventoryItem>> {
    let rows = parse_rows(text);
    let Some((header, body)) = rows.split_first() else {
        return Err(AppError::CsvImport("empty file".to_string()));
    };

    let cols: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect();
    if !cols.contains_key("name") {
        return Err(AppError::CsvImport("missing required column: name".to_string()));
    }

    let get = |row: &[String], key: &str| -> Option<String> {
        cols.get(key).and_then(|&i| row.get(i)).cloned()
    };

    Ok(body
        .iter()
        .map(|row| RawInventoryItem {
            name: get(row, "name"),
            sku: get(row, "sku"),
            brand: get(row, "brand"),
            sizes: get(row, "sizes").map(Value::String),
            price: get(row, "price").map(Value::String),
            url: get(row, "url"),
            image_url: get(row, "image_url"),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    fn raw_wtb(name: &str) -> RawWtbItem {
        RawWtbItem { name: Some(name.to_string()), ..RawWtbItem::default() }
    }

    #[test]
    fn blank_names_are_rejected_at_the_boundary() {
        let raw = vec![
            raw_wtb("Air Max 90"),
            RawWtbItem { name: Some("   ".to_string()), ..RawWtbItem::default() },
            RawWtbItem::default(),
        ];
        let (items, rejected) = validate_wtb(raw);
        assert_eq!(items.len(), 1);
        assert_eq!(rejected, 2);
    }

    #[test]
    fn fields_are_trimmed_and_empty_strings_become_none() {
        let raw = vec![RawWtbItem {
            name: Some("  Air Max 90  ".to_string()),
            sku: Some("  ".to_string()),
            brand: Some(" Nike ".to_string()),
            ..RawWtbItem::default()
        }];
        let (items, _) = validate_wtb(raw);
        assert_eq!(items[0].name, "Air Max 90");
        assert_eq!(items[0].sku, None);
        assert_eq!(items[0].brand.as_deref(), Some("Nike"));
    }

    #[test]
    fn prices_coerce_from_numbers_and_strings() {
        let raw = vec![RawWtbItem {
            name: Some("x".to_string()),
            price_min: Some(Value::from(120.5)),
            price_max: Some(Value::String(" 180 ".to_string())),
            ..RawWtbItem::default()
        }];
        let (items, _) = validate_wtb(raw);
        assert_eq!(items[0].price_min, Some(120.5));
        assert_eq!(items[0].price_max, Some(180.0));

        let raw = vec![RawWtbItem {
            name: Some("x".to_string()),
            price_min: Some(Value::String("not a price".to_string())),
            ..RawWtbItem::default()
        }];
        let (items, _) = validate_wtb(raw);
        assert_eq!(items[0].price_min, None);
    }

    #[test]
    fn sizes_coerce_from_arrays_and_separated_strings() {
        let from_array = coerce_sizes(Some(serde_json::json!(["42", " 43 ", "42"])));
        assert_eq!(from_array, vec!["42", "43"]);

        let from_string = coerce_sizes(Some(Value::String("42; 43 ;;42".to_string())));
        assert_eq!(from_string, vec!["42", "43"]);

        assert!(coerce_sizes(None).is_empty());
    }

    #[test]
    fn csv_maps_columns_by_header_name() {
        let text = "name,sku,price,sizes\nAir Max 90,AM90,120,42;43\n,missing-name,5,\n";
        let raw = csv_to_inventory_items(text).unwrap();
        assert_eq!(raw.len(), 2);

        let (items, rejected) = validate_inventory(raw);
        assert_eq!(items.len(), 1);
        assert_eq!(rejected, 1);
        assert_eq!(items[0].sku.as_deref(), Some("AM90"));
        assert_eq!(items[0].price, Some(120.0));
        assert_eq!(items[0].sizes, vec!["42", "43"]);
    }

    #[test]
    fn csv_without_name_column_is_an_error() {
        assert!(matches!(
            csv_to_inventory_items("sku,price\nA,1\n"),
            Err(AppError::CsvImport(_))
        ));
    }

    async fn service() -> (IngestService, Arc<ResultCache>, Arc<StatusBoard>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let status = Arc::new(StatusBoard::new());
        let cache = Arc::new(ResultCache::new());
        let (tx, rx) = mpsc::channel(64);
        // Drain progress events so sends never back up in tests.
        tokio::spawn(async move {
            let mut rx = rx;
            while rx.recv().await.is_some() {}
        });
        (
            IngestService::new(pool, Arc::clone(&status), Arc::clone(&cache), tx),
            cache,
            status,
        )
    }

    #[tokio::test]
    async fn ingest_completes_session_and_invalidates_cache() {
        let (svc, cache, status) = service().await;

        let epoch = cache.epoch();
        cache.store_if_current(epoch, crate::types::ClassificationResult::default());
        assert!(cache.peek().is_some());

        let outcome = svc
            .ingest_wtb(Some("store-x".to_string()), vec![raw_wtb("Air Max 90")])
            .await
            .unwrap();
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.rejected, 0);
        assert!(cache.peek().is_none());
        assert!(!status.is_running(SourceKind::Wtb));
    }

    #[tokio::test]
    async fn second_ingest_of_same_kind_is_rejected_while_running() {
        let (svc, _cache, status) = service().await;

        status.try_begin(SourceKind::Wtb).unwrap();
        let err = svc.ingest_wtb(None, vec![raw_wtb("x")]).await.unwrap_err();
        assert!(matches!(err, AppError::ScrapeInProgress(SourceKind::Wtb)));

        // The other kind is unaffected.
        let ok = svc.ingest_inventory(None, vec![]).await;
        assert!(ok.is_ok());
    }
}
