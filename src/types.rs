use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Source kind
// ---------------------------------------------------------------------------

/// Which side of the reconciliation a session belongs to.
/// Stored as lowercase TEXT in `scrape_sessions.source_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SourceKind {
    /// Want-to-buy listings scraped from external marketplaces.
    Wtb,
    /// The seller's own stock snapshot.
    Inventory,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Wtb => "wtb",
            SourceKind::Inventory => "inventory",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wtb" => Some(SourceKind::Wtb),
            "inventory" => Some(SourceKind::Inventory),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// One ingestion run. Immutable once `completed_at` is set; a session that
/// never completes is abandoned data and is never surfaced as "latest".
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSession {
    pub id: String,
    pub source_kind: SourceKind,
    pub origin_label: Option<String>,
    /// Epoch milliseconds UTC.
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub item_count: i64,
}

impl ScrapeSession {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

// ---------------------------------------------------------------------------
// Raw observations
// ---------------------------------------------------------------------------

/// One raw "wanted" sighting, as stored. Never mutated after insert.
#[derive(Debug, Clone)]
pub struct WtbObservation {
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

/// A validated WTB observation awaiting insert. Produced only by the
/// ingestion boundary; `name` is guaranteed non-blank.
#[derive(Debug, Clone)]
pub struct NewWtbObservation {
    pub name: String,
    pub sku: Option<String>,
    pub brand: Option<String>,
    pub size: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub origin_store: Option<String>,
    pub image_url: Option<String>,
}

/// One raw "have" sighting, as stored.
#[derive(Debug, Clone)]
pub struct InventoryObservation {
    pub id: i64,
    pub session_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub brand: Option<String>,
    /// Distinct size labels in first-seen order. May be empty.
    pub sizes: Vec<String>,
    pub price: Option<f64>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

/// A validated inventory observation awaiting insert.
#[derive(Debug, Clone)]
pub struct NewInventoryObservation {
    pub name: String,
    pub sku: Option<String>,
    pub brand: Option<String>,
    pub sizes: Vec<String>,
    pub price: Option<f64>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Demand aggregation
// ---------------------------------------------------------------------------

/// All WTB observations of one session folded under a single product
/// identity. `demand_count` equals the number of raw rows folded in.
#[derive(Debug, Clone)]
pub struct DemandRecord {
    /// Upper-cased SKU when the group has one, else the normalized name.
    pub identity_key: String,
    pub name: String,
    pub sku: Option<String>,
    pub brand: Option<String>,
    pub demand_count: u32,
    /// Distinct origin stores, first-seen order.
    pub stores: Vec<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    /// Distinct sizes, first-seen order.
    pub sizes_wanted: Vec<String>,
    /// Last non-null image seen in the group.
    pub image_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Match verdict
// ---------------------------------------------------------------------------

/// Outcome of resolving one demand record against an inventory snapshot.
/// Always definite — ties are broken deterministically, never raised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchVerdict {
    /// Index into the inventory snapshot, plus match confidence.
    /// Confidence is 1.0 for the exact tiers, the similarity score
    /// (possibly above 1.0 with the brand bonus) for fuzzy hits.
    Match { index: usize, confidence: f64 },
    NoMatch,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Demanded but absent from inventory.
#[derive(Debug, Clone, Serialize)]
pub struct MissingEntry {
    pub wtb_name: String,
    pub wtb_sku: Option<String>,
    pub brand: Option<String>,
    pub demand_count: u32,
    pub stores_wanting: Vec<String>,
    pub wtb_price_min: Option<f64>,
    pub wtb_price_max: Option<f64>,
    pub sizes_wanted: Vec<String>,
    pub image_url: Option<String>,
}

/// Demanded and in stock — demand fields plus the matched inventory item.
#[derive(Debug, Clone, Serialize)]
pub struct InStockEntry {
    pub wtb_name: String,
    pub wtb_sku: Option<String>,
    pub brand: Option<String>,
    pub demand_count: u32,
    pub stores_wanting: Vec<String>,
    pub wtb_price_min: Option<f64>,
    pub wtb_price_max: Option<f64>,
    pub sizes_wanted: Vec<String>,
    /// Inventory image when present, else the WTB image.
    pub image_url: Option<String>,
    pub my_product_name: String,
    pub my_product_sku: Option<String>,
    pub my_product_price: Option<f64>,
    pub my_product_url: Option<String>,
    pub my_sizes_available: Vec<String>,
    pub match_confidence: f64,
}

/// In stock but nobody wants it.
#[derive(Debug, Clone, Serialize)]
pub struct NoDemandEntry {
    pub my_product_name: String,
    pub my_product_sku: Option<String>,
    pub my_product_price: Option<f64>,
    pub my_product_url: Option<String>,
    pub my_sizes_available: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassificationSummary {
    /// Demand records considered (after aggregation).
    pub total_wtb_items: usize,
    /// Inventory observations considered.
    pub total_my_products: usize,
    /// Raw WTB rows the demand records were folded from.
    pub total_raw_wtb_rows: usize,
    pub missing_count: usize,
    pub in_stock_count: usize,
    pub no_demand_count: usize,
    /// Sessions the result was computed from; None when the side had no
    /// usable session.
    pub wtb_session_id: Option<String>,
    pub inventory_session_id: Option<String>,
}

/// The three-way partition. Every demand record appears in exactly one of
/// `missing`/`in_stock`; every inventory observation in exactly one of
/// `in_stock`/`no_demand` (claimed items count once).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassificationResult {
    pub missing: Vec<MissingEntry>,
    pub in_stock: Vec<InStockEntry>,
    pub no_demand: Vec<NoDemandEntry>,
    pub summary: ClassificationSummary,
}
