use std::collections::HashMap;

use crate::config::{BRAND_MATCH_BONUS, SIMILARITY_THRESHOLD};
use crate::matching::normalize::{normalize_name, similarity};
use crate::types::{DemandRecord, InventoryObservation, MatchVerdict};

/// Exact-lookup indexes over one inventory snapshot, built once per
/// classification run. On duplicate SKUs or normalized names the first
/// occurrence wins.
pub struct InventoryIndex<'a> {
    items: &'a [InventoryObservation],
    by_sku: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl<'a> InventoryIndex<'a> {
    pub fn build(items: &'a [InventoryObservation]) -> Self {
        let mut by_sku = HashMap::new();
        let mut by_name = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            if let Some(sku) = item.sku.as_deref() {
                let key = sku.trim().to_uppercase();
                if !key.is_empty() {
                    by_sku.entry(key).or_insert(i);
                }
            }
            let name_key = normalize_name(&item.name);
            if !name_key.is_empty() {
                by_name.entry(name_key).or_insert(i);
            }
        }
        Self { items, by_sku, by_name }
    }
}

/// Bind one demand record to an inventory observation, or report no match.
/// Layered strategy, first hit wins: exact SKU, exact normalized name, fuzzy
/// name similarity. Every tier is deterministic given the snapshot's stable
/// iteration order, so the verdict is always definite; ambiguity is broken,
/// never raised.
pub fn resolve(record: &DemandRecord, index: &InventoryIndex<'_>) -> MatchVerdict {
    // Tier 1: exact SKU, case-insensitive.
    if let Some(sku) = record.sku.as_deref() {
        let key = sku.trim().to_uppercase();
        if !key.is_empty() {
            if let Some(&i) = index.by_sku.get(&key) {
                return MatchVerdict::Match { index: i, confidence: 1.0 };
            }
        }
    }

    // Tier 2: exact normalized name.
    let name_key = normalize_name(&record.name);
    if !name_key.is_empty() {
        if let Some(&i) = index.by_name.get(&name_key) {
            return MatchVerdict::Match { index: i, confidence: 1.0 };
        }
    }

    // Tier 3: fuzzy similarity over every inventory name. Strictly-greater
    // replacement keeps the earliest candidate on ties.
    let mut best: Option<(usize, f64)> = None;
    for (i, item) in index.items.iter().enumerate() {
        let mut score = similarity(&record.name, &item.name);
        if let (Some(a), Some(b)) = (record.brand.as_deref(), item.brand.as_deref()) {
            if !a.is_empty() && !b.is_empty() && a.to_lowercase() == b.to_lowercase() {
                score += BRAND_MATCH_BONUS;
            }
        }
        if score >= SIMILARITY_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }

    match best {
        Some((i, score)) => MatchVerdict::Match { index: i, confidence: score },
        None => MatchVerdict::NoMatch,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
