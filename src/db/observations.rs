use sqlx::QueryBuilder;

use crate::config::INSERT_CHUNK_ROWS;
use crate::db::models::{InventoryRow, WtbRow};
use crate::error::Result;
use crate::types::{
    InventoryObservation, NewInventoryObservation, NewWtbObservation, WtbObservation,
};

/// Append-only, session-scoped store of raw observations. Appends are chunked
/// to respect SQLite's bind-parameter limit but run in a single transaction,
/// so a logical append either lands whole or not at all. A failed append
/// leaves the owning session incomplete, which keeps partially-ingested data
/// invisible to every read path. No update or delete operations exist;
/// retention is an external concern.
pub struct ObservationStore {
    pool: sqlx::SqlitePool,
}

impl ObservationStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a batch of WTB observations. All-or-nothing; returns the
    /// number of rows written.
    pub async fn append_wtb(
        &self,
        session_id: &str,
        items: &[NewWtbObservation],
    ) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for chunk in items.chunks(INSERT_CHUNK_ROWS) {
            let mut qb = QueryBuilder::new(
                "INSERT INTO wtb_observations \
                 (session_id, name, sku, brand, size, price_min, price_max, origin_store, image_url) ",
            );
            qb.push_values(chunk, |mut b, item| {
                b.push_bind(session_id)
                    .push_bind(&item.name)
                    .push_bind(&item.sku)
                    .push_bind(&item.brand)
                    .push_bind(&item.size)
                    .push_bind(item.price_min)
                    .push_bind(item.price_max)
                    .push_bind(&item.origin_store)
                    .push_bind(&item.image_url);
            });
            qb.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(items.len() as u64)
    }

    /// Append a batch of inventory observations. All-or-nothing. Sizes are
    /// stored as a JSON array, NULL when empty.
    pub async fn append_inventory(
        &self,
        session_id: &str,
        items: &[NewInventoryObservation],
    ) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut sizes_json = Vec::with_capacity(items.len());
        for item in items {
            if item.sizes.is_empty() {
                sizes_json.push(None);
            } else {
                sizes_json.push(Some(serde_json::to_string(&item.sizes)?));
            }
        }

        let mut tx = self.pool.begin().await?;
        for (chunk, json_chunk) in items
            .chunks(INSERT_CHUNK_ROWS)
            .zip(sizes_json.chunks(INSERT_CHUNK_ROWS))
        {
            let mut qb = QueryBuilder::new(
                "INSERT INTO inventory_observations \
                 (session_id, name, sku, brand, sizes, price, url, image_url) ",
            );
            qb.push_values(chunk.iter().zip(json_chunk), |mut b, (item, sizes)| {
                b.push_bind(session_id)
                    .push_bind(&item.name)
                    .push_bind(&item.sku)
                    .push_bind(&item.brand)
                    .push_bind(sizes)
                    .push_bind(item.price)
                    .push_bind(&item.url)
                    .push_bind(&item.image_url);
            });
            qb.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(items.len() as u64)
    }

    /// All WTB observations of one session, in insertion order. The stable
    /// order is what makes aggregation and tie-breaks reproducible.
    pub async fn wtb_for_session(&self, session_id: &str) -> Result<Vec<WtbObservation>> {
        let rows = sqlx::query_as::<_, WtbRow>(
            r#"
            SELECT id, session_id, name, sku, brand, size, price_min, price_max,
                   origin_store, image_url
            FROM wtb_observations
            WHERE session_id = ?
            ORDER BY id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// All inventory observations of one session, in insertion order.
    pub async fn inventory_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<InventoryObservation>> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT id, session_id, name, sku, brand, sizes, price, url, image_url
            FROM inventory_observations
            WHERE session_id = ?
            ORDER BY id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Total WTB rows across all sessions, for the status/health surface.
    pub async fn wtb_total_count(&self) -> Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM wtb_observations")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn inventory_total_count(&self) -> Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM inventory_observations")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sessions::SessionStore;
    use crate::types::SourceKind;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn stores() -> (SessionStore, ObservationStore) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        (SessionStore::new(pool.clone()), ObservationStore::new(pool))
    }

    fn wtb(name: &str) -> NewWtbObservation {
        NewWtbObservation {
            name: name.to_string(),
            sku: None,
            brand: None,
            size: None,
            price_min: None,
            price_max: None,
            origin_store: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn append_preserves_insertion_order_across_chunks() {
        let (sessions, obs) = stores().await;
        let s = sessions.create(SourceKind::Wtb, None).await.unwrap();

        // More rows than one chunk holds.
        let items: Vec<_> = (0..250).map(|i| wtb(&format!("item {i:03}"))).collect();
        let written = obs.append_wtb(&s.id, &items).await.unwrap();
        assert_eq!(written, 250);

        let read = obs.wtb_for_session(&s.id).await.unwrap();
        assert_eq!(read.len(), 250);
        for (i, o) in read.iter().enumerate() {
            assert_eq!(o.name, format!("item {i:03}"));
        }
    }

    #[tokio::test]
    async fn observations_are_scoped_by_session() {
        let (sessions, obs) = stores().await;
        let a = sessions.create(SourceKind::Wtb, None).await.unwrap();
        let b = sessions.create(SourceKind::Wtb, None).await.unwrap();

        obs.append_wtb(&a.id, &[wtb("only in a")]).await.unwrap();
        obs.append_wtb(&b.id, &[wtb("one"), wtb("two")]).await.unwrap();

        assert_eq!(obs.wtb_for_session(&a.id).await.unwrap().len(), 1);
        assert_eq!(obs.wtb_for_session(&b.id).await.unwrap().len(), 2);
        assert_eq!(obs.wtb_total_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn inventory_sizes_survive_storage() {
        let (sessions, obs) = stores().await;
        let s = sessions.create(SourceKind::Inventory, None).await.unwrap();

        let items = vec![
            NewInventoryObservation {
                name: "Air Max 90".to_string(),
                sku: Some("AM90".to_string()),
                brand: Some("Nike".to_string()),
                sizes: vec!["42".to_string(), "43".to_string()],
                price: Some(120.0),
                url: None,
                image_url: None,
            },
            NewInventoryObservation {
                name: "Blazer Mid".to_string(),
                sku: None,
                brand: None,
                sizes: vec![],
                price: None,
                url: None,
                image_url: None,
            },
        ];
        obs.append_inventory(&s.id, &items).await.unwrap();

        let read = obs.inventory_for_session(&s.id).await.unwrap();
        assert_eq!(read[0].sizes, vec!["42", "43"]);
        assert!(read[1].sizes.is_empty());
    }

    #[tokio::test]
    async fn empty_append_is_a_noop() {
        let (sessions, obs) = stores().await;
        let s = sessions.create(SourceKind::Wtb, None).await.unwrap();
        assert_eq!(obs.append_wtb(&s.id, &[]).await.unwrap(), 0);
        assert!(obs.wtb_for_session(&s.id).await.unwrap().is_empty());
    }
}
