pub mod models;
pub mod observations;
pub mod sessions;

pub use observations::ObservationStore;
pub use sessions::SessionStore;
