use std::collections::HashMap;

use crate::matching::normalize_name;
use crate::types::{DemandRecord, WtbObservation};

/// Fold one session's raw WTB observations into one record per product
/// identity. Raw rows are stored duplicate-laden on purpose; dedup happens
/// here at read time so history stays reconstructable.
///
/// A SKU-bearing row keys by its upper-cased SKU, a bare row by its
/// normalized name, and a secondary name index merges the two keying modes
/// when the names coincide: a row with SKU `ABC-100` and a SKU-less row both
/// named "Air Zoom 1" fold into one record either way around.
///
/// Observations must arrive in stable store order. Output order is first-seen
/// group order; the classifier imposes the final sort.
pub fn aggregate(observations: &[WtbObservation]) -> Vec<DemandRecord> {
    let mut records: Vec<DemandRecord> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for obs in observations {
        let sku_key = obs
            .sku
            .as_deref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty());
        let name_key = normalize_name(&obs.name);
        let identity_key = sku_key.clone().unwrap_or_else(|| name_key.clone());

        let existing = by_key.get(&identity_key).copied().or_else(|| {
            if name_key.is_empty() {
                None
            } else {
                by_name.get(&name_key).copied()
            }
        });

        let idx = match existing {
            Some(i) => i,
            None => {
                records.push(DemandRecord {
                    identity_key: identity_key.clone(),
                    name: obs.name.clone(),
                    sku: obs.sku.clone(),
                    brand: obs.brand.clone(),
                    demand_count: 0,
                    stores: Vec::new(),
                    price_min: None,
                    price_max: None,
                    sizes_wanted: Vec::new(),
                    image_url: None,
                });
                records.len() - 1
            }
        };

        // Register both keys so later rows reach this record through either
        // mode, whichever existed first.
        by_key.entry(identity_key).or_insert(idx);
        if let Some(k) = sku_key {
            by_key.entry(k).or_insert(idx);
        }
        if !name_key.is_empty() {
            by_name.entry(name_key).or_insert(idx);
        }

        fold(&mut records[idx], obs);
    }

    records
}

fn fold(rec: &mut DemandRecord, obs: &WtbObservation) {
    rec.demand_count += 1;

    if let Some(store) = obs.origin_store.as_deref() {
        if !store.is_empty() && !rec.stores.iter().any(|s| s == store) {
            rec.stores.push(store.to_string());
        }
    }
    if let Some(p) = obs.price_min {
        rec.price_min = Some(rec.price_min.map_or(p, |cur| cur.min(p)));
    }
    if let Some(p) = obs.price_max {
        rec.price_max = Some(rec.price_max.map_or(p, |cur| cur.max(p)));
    }
    if let Some(size) = obs.size.as_deref() {
        if !size.is_empty() && !rec.sizes_wanted.iter().any(|s| s == size) {
            rec.sizes_wanted.push(size.to_string());
        }
    }
    if obs.image_url.is_some() {
        rec.image_url = obs.image_url.clone();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
