//! Bounded, indexed log ring for the dashboard's polling endpoint.
//! Indexes are monotonic so a client can ask "everything after N".

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

use crate::config::CONSOLE_LOG_CAPACITY;

#[derive(Debug, Clone, Serialize)]
pub struct ConsoleEntry {
    pub index: u64,
    pub timestamp: String,
    pub message: String,
}

struct Inner {
    entries: VecDeque<ConsoleEntry>,
    last_index: u64,
}

pub struct ConsoleLog {
    inner: Mutex<Inner>,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(CONSOLE_LOG_CAPACITY),
                last_index: 0,
            }),
        }
    }

    pub fn push(&self, message: impl Into<String>) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.last_index += 1;
        let entry = ConsoleEntry {
            index: inner.last_index,
            timestamp: Utc::now().to_rfc3339(),
            message: message.into(),
        };
        if inner.entries.len() == CONSOLE_LOG_CAPACITY {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
    }

    /// Entries with index greater than `since`, plus the newest index for
    /// the client's next poll.
    pub fn since(&self, since: u64) -> (Vec<ConsoleEntry>, u64) {
        let Ok(inner) = self.inner.lock() else {
            return (Vec::new(), 0);
        };
        let entries = inner
            .entries
            .iter()
            .filter(|e| e.index > since)
            .cloned()
            .collect();
        (entries, inner.last_index)
    }
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
