use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::state::{ConsoleLog, StatusBoard};
use crate::types::SourceKind;

/// Progress reporting from an ingest run: an ordered event stream over a
/// bounded channel with a single consumer task that mirrors events into the
/// status board and the console buffer. Progress is advisory; a full channel
/// drops the event rather than stalling the ingest path.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started {
        kind: SourceKind,
        origin_label: Option<String>,
    },
    Progress {
        kind: SourceKind,
        message: String,
    },
    Completed {
        kind: SourceKind,
        session_id: String,
        accepted: u64,
        rejected: u64,
    },
    Failed {
        kind: SourceKind,
        error: String,
    },
}

fn label(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Wtb => "WTB",
        SourceKind::Inventory => "Store",
    }
}

/// Non-blocking send; drops with a warn when the channel is full.
pub fn emit(tx: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) {
    if let Err(e) = tx.try_send(event) {
        warn!("Progress channel full, dropping event: {e}");
    }
}

/// Spawn the single consumer. Runs until every sender is dropped.
pub fn spawn_consumer(
    mut rx: mpsc::Receiver<ProgressEvent>,
    status: Arc<StatusBoard>,
    console: Arc<ConsoleLog>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::Started { kind, origin_label } => {
                    let msg = match origin_label {
                        Some(origin) => format!("{}: Ingest started ({origin})", label(kind)),
                        None => format!("{}: Ingest started", label(kind)),
                    };
                    status.set_progress(kind, &msg);
                    console.push(msg);
                }
                ProgressEvent::Progress { kind, message } => {
                    status.set_progress(kind, &message);
                    console.push(format!("{}: {message}", label(kind)));
                }
                ProgressEvent::Completed { kind, session_id, accepted, rejected } => {
                    // Final status is written by the ingest path itself; the
                    // consumer only narrates.
                    console.push(format!(
                        "{}: Done! {accepted} items stored ({rejected} rejected, session {session_id})",
                        label(kind)
                    ));
                }
                ProgressEvent::Failed { kind, error } => {
                    console.push(format!("{} ERROR: {error}", label(kind)));
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
