// Database row types, decoded via `query_as` and converted into the domain
// types in `crate::types`.

use sqlx::FromRow;

use crate::types::{InventoryObservation, ScrapeSession, SourceKind, WtbObservation};

#[derive(Debug, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub source_kind: SourceKind,
    pub origin_label: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub item_count: i64,
}

impl From<SessionRow> for ScrapeSession {
    fn from(r: SessionRow) -> Self {
        ScrapeSession {
            id: r.id,
            source_kind: r.source_kind,
            origin_label: r.origin_label,
            started_at: r.started_at,
            completed_at: r.completed_at,
            item_count: r.item_count,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct WtbRow {
    pub id: i64,
    pub session_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub brand: Option<String>,
    pub size: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub origin_store: Option<String>,
    pub image_url: Option<String>,
}

impl From<WtbRow> for WtbObservation {
    fn from(r: WtbRow) -> Self {
        WtbObservation {
            id: r.id,
            session_id: r.session_id,
            name: r.name,
            sku: r.sku,
            brand: r.brand,
            size: r.size,
            price_min: r.price_min,
            price_max: r.price_max,
            origin_store: r.origin_store,
            image_url: r.image_url,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct InventoryRow {
    pub id: i64,
    pub session_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub brand: Option<String>,
    /// JSON array of size labels, NULL when none were observed.
    pub sizes: Option<String>,
    pub price: Option<f64>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

impl From<InventoryRow> for InventoryObservation {
    fn from(r: InventoryRow) -> Self {
        let sizes = r
            .sizes
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();
        InventoryObservation {
            id: r.id,
            session_id: r.session_id,
            name: r.name,
            sku: r.sku,
            brand: r.brand,
            sizes,
            price: r.price,
            url: r.url,
            image_url: r.image_url,
        }
    }
}
