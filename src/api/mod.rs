pub mod export;
pub mod routes;

pub use routes::{router, ApiState};
