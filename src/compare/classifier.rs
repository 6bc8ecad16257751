use tracing::debug;

use crate::db::{ObservationStore, SessionStore};
use crate::demand::aggregate;
use crate::error::Result;
use crate::matching::{resolve, InventoryIndex};
use crate::types::{
    ClassificationResult, ClassificationSummary, DemandRecord, InStockEntry,
    InventoryObservation, MatchVerdict, MissingEntry, NoDemandEntry, ScrapeSession, SourceKind,
};

/// Three-way classification of demand against inventory, always computed
/// from exactly one WTB session and one inventory session (latest completed
/// by default). A side with no usable session degrades to the empty
/// observation set: with no inventory, every demand record is `missing`;
/// with no demand, every inventory item is `no_demand`. The read path never
/// fails on a missing or unknown session.
pub struct Classifier {
    sessions: SessionStore,
    observations: ObservationStore,
}

impl Classifier {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            sessions: SessionStore::new(pool.clone()),
            observations: ObservationStore::new(pool),
        }
    }

    /// Classify one WTB session against one inventory session. Explicit ids
    /// override the default "latest completed" resolution; an explicit id
    /// that is unknown, incomplete, or of the wrong kind degrades to the
    /// empty set for that side.
    pub async fn classify(
        &self,
        wtb_session: Option<&str>,
        inventory_session: Option<&str>,
    ) -> Result<ClassificationResult> {
        let wtb = self.resolve_session(SourceKind::Wtb, wtb_session).await?;
        let inventory = self
            .resolve_session(SourceKind::Inventory, inventory_session)
            .await?;

        let wtb_rows = match &wtb {
            Some(s) => self.observations.wtb_for_session(&s.id).await?,
            None => Vec::new(),
        };
        let inventory_rows = match &inventory {
            Some(s) => self.observations.inventory_for_session(&s.id).await?,
            None => Vec::new(),
        };

        let records = aggregate(&wtb_rows);
        let result = partition(
            records,
            &inventory_rows,
            wtb_rows.len(),
            wtb.as_ref().map(|s| s.id.clone()),
            inventory.as_ref().map(|s| s.id.clone()),
        );

        debug!(
            missing = result.summary.missing_count,
            in_stock = result.summary.in_stock_count,
            no_demand = result.summary.no_demand_count,
            "Classification complete"
        );
        Ok(result)
    }

    async fn resolve_session(
        &self,
        kind: SourceKind,
        explicit: Option<&str>,
    ) -> Result<Option<ScrapeSession>> {
        match explicit {
            Some(id) => {
                let session = self.sessions.get(id).await?;
                Ok(session.filter(|s| s.source_kind == kind && s.is_completed()))
            }
            None => self.sessions.latest_completed(kind).await,
        }
    }
}

/// Pure partition step. Every demand record lands in exactly one of
/// `missing`/`in_stock`; every inventory row in exactly one of
/// `in_stock`/`no_demand` — an item claimed by several records counts once.
fn partition(
    records: Vec<DemandRecord>,
    inventory: &[InventoryObservation],
    raw_wtb_rows: usize,
    wtb_session_id: Option<String>,
    inventory_session_id: Option<String>,
) -> ClassificationResult {
    let index = InventoryIndex::build(inventory);
    let total_records = records.len();

    let mut missing = Vec::new();
    let mut in_stock = Vec::new();
    let mut claimed: std::collections::HashSet<i64> = std::collections::HashSet::new();

    for record in records {
        match resolve(&record, &index) {
            MatchVerdict::Match { index: i, confidence } => {
                let item = &inventory[i];
                claimed.insert(item.id);
                in_stock.push(in_stock_entry(record, item, confidence));
            }
            MatchVerdict::NoMatch => missing.push(missing_entry(record)),
        }
    }

    let mut no_demand: Vec<NoDemandEntry> = inventory
        .iter()
        .filter(|item| !claimed.contains(&item.id))
        .map(no_demand_entry)
        .collect();

    // Stable sorts keep aggregation order among equals.
    missing.sort_by(|a, b| b.demand_count.cmp(&a.demand_count));
    in_stock.sort_by(|a, b| b.demand_count.cmp(&a.demand_count));
    no_demand.sort_by(|a, b| a.my_product_name.cmp(&b.my_product_name));

    let summary = ClassificationSummary {
        total_wtb_items: total_records,
        total_my_products: inventory.len(),
        total_raw_wtb_rows: raw_wtb_rows,
        missing_count: missing.len(),
        in_stock_count: in_stock.len(),
        no_demand_count: no_demand.len(),
        wtb_session_id,
        inventory_session_id,
    };

    ClassificationResult { missing, in_stock, no_demand, summary }
}

fn missing_entry(record: DemandRecord) -> MissingEntry {
    MissingEntry {
        wtb_name: record.name,
        wtb_sku: record.sku,
        brand: record.brand,
        demand_count: record.demand_count,
        stores_wanting: record.stores,
        wtb_price_min: record.price_min,
        wtb_price_max: record.price_max,
        sizes_wanted: record.sizes_wanted,
        image_url: record.image_url,
    }
}

fn in_stock_entry(
    record: DemandRecord,
    item: &InventoryObservation,
    confidence: f64,
) -> InStockEntry {
    InStockEntry {
        wtb_name: record.name,
        wtb_sku: record.sku,
        brand: record.brand,
        demand_count: record.demand_count,
        stores_wanting: record.stores,
        wtb_price_min: record.price_min,
        wtb_price_max: record.price_max,
        sizes_wanted: record.sizes_wanted,
        image_url: item.image_url.clone().or(record.image_url),
        my_product_name: item.name.clone(),
        my_product_sku: item.sku.clone(),
        my_product_price: item.price,
        my_product_url: item.url.clone(),
        my_sizes_available: item.sizes.clone(),
        match_confidence: confidence,
    }
}

fn no_demand_entry(item: &InventoryObservation) -> NoDemandEntry {
    NoDemandEntry {
        my_product_name: item.name.clone(),
        my_product_sku: item.sku.clone(),
        my_product_price: item.price,
        my_product_url: item.url.clone(),
        my_sizes_available: item.sizes.clone(),
        image_url: item.image_url.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, sku: Option<&str>, demand_count: u32) -> DemandRecord {
        DemandRecord {
            identity_key: name.to_lowercase(),
            name: name.to_string(),
            sku: sku.map(str::to_string),
            brand: None,
            demand_count,
            stores: vec!["X".to_string()],
            price_min: None,
            price_max: None,
            sizes_wanted: vec![],
            image_url: Some("wtb.jpg".to_string()),
        }
    }

    fn item(id: i64, name: &str, sku: Option<&str>) -> InventoryObservation {
        InventoryObservation {
            id,
            session_id: "inv".to_string(),
            name: name.to_string(),
            sku: sku.map(str::to_string),
            brand: None,
            sizes: vec!["42".to_string()],
            price: Some(99.0),
            url: Some("https://shop.example/p".to_string()),
            image_url: None,
        }
    }

    #[test]
    fn partition_is_complete_and_disjoint() {
        let records = vec![
            record("Air Max 90", None, 3),
            record("Jordan 4", None, 1),
            record("Unheard Of Shoe", None, 2),
        ];
        let inventory = vec![
            item(1, "Air Max 90", None),
            item(2, "Jordan 4", None),
            item(3, "Dust Collector", None),
        ];

        let result = partition(records, &inventory, 6, None, None);

        assert_eq!(result.missing.len() + result.in_stock.len(), 3);
        assert_eq!(result.in_stock.len() + result.no_demand.len(), 3);
        assert_eq!(result.missing.len(), 1);
        assert_eq!(result.no_demand.len(), 1);
        assert_eq!(result.no_demand[0].my_product_name, "Dust Collector");
        assert_eq!(result.summary.total_raw_wtb_rows, 6);
    }

    #[test]
    fn inventory_item_claimed_by_two_records_counts_once() {
        // Both records fuzzy-resolve to the same inventory row.
        let records = vec![
            record("Dunk Low Pandaa", None, 2),
            record("Dunk Low Pandas", None, 1),
        ];
        let inventory = vec![item(7, "Dunk Low Panda", None)];

        let result = partition(records, &inventory, 3, None, None);

        assert_eq!(result.in_stock.len(), 2);
        assert!(result.no_demand.is_empty());
        assert_eq!(result.summary.total_my_products, 1);
    }

    #[test]
    fn lists_are_sorted() {
        let records = vec![
            record("Low Demand Missing", None, 1),
            record("High Demand Missing", None, 9),
            record("Air Max 90", None, 2),
            record("Jordan 4", None, 5),
        ];
        let inventory = vec![
            item(1, "Jordan 4", None),
            item(2, "Air Max 90", None),
            item(3, "Zebra", None),
            item(4, "Alpha", None),
        ];

        let result = partition(records, &inventory, 17, None, None);

        assert_eq!(result.missing[0].wtb_name, "High Demand Missing");
        assert_eq!(result.in_stock[0].wtb_name, "Jordan 4");
        let names: Vec<_> = result.no_demand.iter().map(|e| e.my_product_name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zebra"]);
    }

    #[test]
    fn in_stock_prefers_inventory_image_when_present() {
        let mut with_image = item(1, "Air Max 90", None);
        with_image.image_url = Some("inventory.jpg".to_string());

        let result = partition(vec![record("Air Max 90", None, 1)], &[with_image], 1, None, None);
        assert_eq!(result.in_stock[0].image_url.as_deref(), Some("inventory.jpg"));

        let without_image = item(2, "Air Max 90", None);
        let result = partition(vec![record("Air Max 90", None, 1)], &[without_image], 1, None, None);
        assert_eq!(result.in_stock[0].image_url.as_deref(), Some("wtb.jpg"));
    }

    #[test]
    fn empty_inventory_sends_all_demand_to_missing() {
        let records = vec![record("Air Max 90", None, 2), record("Jordan 4", None, 1)];
        let result = partition(records, &[], 3, Some("w".into()), None);

        assert_eq!(result.missing.len(), 2);
        assert!(result.in_stock.is_empty());
        assert!(result.no_demand.is_empty());
        assert_eq!(result.summary.inventory_session_id, None);
    }

    #[test]
    fn empty_demand_sends_all_inventory_to_no_demand() {
        let inventory = vec![item(1, "Air Max 90", None)];
        let result = partition(Vec::new(), &inventory, 0, None, Some("i".into()));

        assert!(result.missing.is_empty());
        assert!(result.in_stock.is_empty());
        assert_eq!(result.no_demand.len(), 1);
    }

    #[test]
    fn empty_everything_yields_zeroed_summary() {
        let result = partition(Vec::new(), &[], 0, None, None);
        assert_eq!(result.summary.missing_count, 0);
        assert_eq!(result.summary.in_stock_count, 0);
        assert_eq!(result.summary.no_demand_count, 0);
        assert_eq!(result.summary.total_wtb_items, 0);
        assert_eq!(result.summary.total_my_products, 0);
    }
}
