use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::db::models::SessionRow;
use crate::error::Result;
use crate::types::{ScrapeSession, SourceKind};

/// Store of ingestion runs. Sessions are created in-progress and marked
/// complete exactly once; only completed sessions are eligible as "latest".
/// An abandoned run leaves an incomplete row behind that no query path ever
/// surfaces.
pub struct SessionStore {
    pool: sqlx::SqlitePool,
}

impl SessionStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new in-progress session and return it.
    pub async fn create(
        &self,
        kind: SourceKind,
        origin_label: Option<&str>,
    ) -> Result<ScrapeSession> {
        let started_at = next_creation_stamp();
        let id = new_session_id(kind, started_at);

        sqlx::query(
            r#"
            INSERT INTO scrape_sessions (id, source_kind, origin_label, started_at, item_count)
            VALUES (?, ?, ?, ?, 0)
            "#,
        )
        .bind(&id)
        .bind(kind)
        .bind(origin_label)
        .bind(started_at)
        .execute(&self.pool)
        .await?;

        Ok(ScrapeSession {
            id,
            source_kind: kind,
            origin_label: origin_label.map(str::to_string),
            started_at,
            completed_at: None,
            item_count: 0,
        })
    }

    /// Mark a session complete with its final item count. Idempotent: a
    /// second call on an already-completed session changes nothing.
    pub async fn complete(&self, session_id: &str, item_count: i64) -> Result<()> {
        let completed_at = Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            UPDATE scrape_sessions
            SET completed_at = ?, item_count = ?
            WHERE id = ? AND completed_at IS NULL
            "#,
        )
        .bind(completed_at)
        .bind(item_count)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recently started *completed* session of a kind. In-progress
    /// sessions are never candidates.
    pub async fn latest_completed(&self, kind: SourceKind) -> Result<Option<ScrapeSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, source_kind, origin_label, started_at, completed_at, item_count
            FROM scrape_sessions
            WHERE source_kind = ? AND completed_at IS NOT NULL
            ORDER BY started_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Session metadata, most recent first. Includes in-progress sessions —
    /// the listing is history, not a source of classification inputs.
    pub async fn list(&self, kind: Option<SourceKind>, limit: i64) -> Result<Vec<ScrapeSession>> {
        let rows = match kind {
            Some(k) => {
                sqlx::query_as::<_, SessionRow>(
                    r#"
                    SELECT id, source_kind, origin_label, started_at, completed_at, item_count
                    FROM scrape_sessions
                    WHERE source_kind = ?
                    ORDER BY started_at DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(k)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SessionRow>(
                    r#"
                    SELECT id, source_kind, origin_label, started_at, completed_at, item_count
                    FROM scrape_sessions
                    ORDER BY started_at DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<ScrapeSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, source_kind, origin_label, started_at, completed_at, item_count
            FROM scrape_sessions
            WHERE id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

static LAST_STAMP_MS: AtomicI64 = AtomicI64::new(0);

/// Millisecond stamp that is strictly increasing within the process. Two
/// creations landing in the same wall-clock millisecond get distinct,
/// creation-ordered stamps instead of an arbitrary tie.
fn next_creation_stamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    loop {
        let last = LAST_STAMP_MS.load(Ordering::SeqCst);
        let next = now.max(last + 1);
        if LAST_STAMP_MS
            .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return next;
        }
    }
}

/// `<kind>-<epoch_ms>-<hex6>`. The fixed-width millisecond component keeps
/// ids sortable by creation time; the random suffix keeps ids from separate
/// processes distinct.
fn new_session_id(kind: SourceKind, started_at: i64) -> String {
    format!("{}-{:013}-{:06x}", kind, started_at, fastrand::u32(..) & 0xff_ffff)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
