pub mod csv;
pub mod events;
pub mod service;

pub use events::{spawn_consumer, ProgressEvent};
pub use service::{IngestService, RawInventoryItem, RawWtbItem};
