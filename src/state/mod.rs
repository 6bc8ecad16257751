pub mod console_log;
pub mod latency;
pub mod result_cache;
pub mod scrape_status;

pub use console_log::ConsoleLog;
pub use latency::LatencyStats;
pub use result_cache::ResultCache;
pub use scrape_status::StatusBoard;
