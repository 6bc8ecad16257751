use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::types::SourceKind;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeStatus {
    pub running: bool,
    pub progress: String,
    /// RFC 3339 timestamp of the last successful run.
    pub last_run: Option<String>,
    /// Item count of the last successful run.
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub wtb: ScrapeStatus,
    pub inventory: ScrapeStatus,
}

/// Per-kind scrape status board. Process-wide state: created at startup,
/// mutated only through the methods here. `try_begin` performs its
/// check-then-set while holding the map entry lock, which is what enforces
/// at-most-one-in-flight per kind; a second request is rejected, not queued.
pub struct StatusBoard {
    entries: DashMap<SourceKind, ScrapeStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let entries = DashMap::new();
        entries.insert(SourceKind::Wtb, ScrapeStatus::default());
        entries.insert(SourceKind::Inventory, ScrapeStatus::default());
        Self { entries }
    }

    /// Claim the running flag for a kind. Fails with `ScrapeInProgress` when
    /// a run of that kind is already in flight.
    pub fn try_begin(&self, kind: SourceKind) -> Result<()> {
        let mut entry = self.entries.entry(kind).or_default();
        if entry.running {
            return Err(AppError::ScrapeInProgress(kind));
        }
        entry.running = true;
        entry.progress = "Starting...".to_string();
        Ok(())
    }

    /// Update the progress line of an in-flight run. Ignored once the run
    /// has finished, so late events cannot overwrite the final status.
    pub fn set_progress(&self, kind: SourceKind, message: &str) {
        if let Some(mut entry) = self.entries.get_mut(&kind) {
            if entry.running {
                entry.progress = message.to_string();
            }
        }
    }

    /// Release the flag after a successful run.
    pub fn complete(&self, kind: SourceKind, count: u64, message: &str) {
        if let Some(mut entry) = self.entries.get_mut(&kind) {
            entry.running = false;
            entry.count = count;
            entry.last_run = Some(Utc::now().to_rfc3339());
            entry.progress = message.to_string();
        }
    }

    /// Release the flag after a failed run. `last_run` and `count` keep
    /// their previous values.
    pub fn fail(&self, kind: SourceKind, error: &str) {
        if let Some(mut entry) = self.entries.get_mut(&kind) {
            entry.running = false;
            entry.progress = format!("Error: {error}");
        }
    }

    pub fn is_running(&self, kind: SourceKind) -> bool {
        self.entries.get(&kind).map(|e| e.running).unwrap_or(false)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let get = |kind| {
            self.entries
                .get(&kind)
                .map(|e| e.clone())
                .unwrap_or_default()
        };
        StatusSnapshot {
            wtb: get(SourceKind::Wtb),
            inventory: get(SourceKind::Inventory),
        }
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
