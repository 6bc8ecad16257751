use std::sync::Mutex;

use chrono::Utc;

use crate::types::ClassificationResult;

#[derive(Debug, Clone)]
pub struct CachedResult {
    pub result: ClassificationResult,
    /// RFC 3339 timestamp of when the result was computed.
    pub computed_at: String,
}

struct Slot {
    value: Option<CachedResult>,
    epoch: u64,
}

/// Single-slot memo of the default classification. Write-through:
/// `invalidate` clears unconditionally and the next reader recomputes.
///
/// An epoch counter makes invalidation win races against in-flight computes.
/// A result computed before an intervening `invalidate` is handed to its
/// caller but never stored, so the slot cannot hold a classification that
/// predates newly committed data. The lock guards only the slot itself,
/// never the compute.
pub struct ResultCache {
    slot: Mutex<Slot>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot { value: None, epoch: 0 }),
        }
    }

    /// The stored value, if any.
    pub fn peek(&self) -> Option<CachedResult> {
        self.slot.lock().ok().and_then(|s| s.value.clone())
    }

    /// Epoch to pass to `store_if_current` after computing outside the lock.
    pub fn epoch(&self) -> u64 {
        self.slot.lock().map(|s| s.epoch).unwrap_or(0)
    }

    /// Store a freshly computed result unless an invalidation happened since
    /// `epoch` was read. Returns the value to serve either way.
    pub fn store_if_current(&self, epoch: u64, result: ClassificationResult) -> CachedResult {
        let cached = CachedResult {
            result,
            computed_at: Utc::now().to_rfc3339(),
        };
        if let Ok(mut slot) = self.slot.lock() {
            if slot.epoch == epoch {
                slot.value = Some(cached.clone());
            }
        }
        cached
    }

    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.value = None;
            slot.epoch += 1;
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
