use crate::error::{AppError, Result};

/// Minimum similarity score for the fuzzy name tier. Candidates below this
/// yield a "no match" verdict rather than a guess.
pub const SIMILARITY_THRESHOLD: f64 = 0.75;

/// Flat bonus added to a fuzzy score when both records carry the same brand
/// (case-insensitive).
pub const BRAND_MATCH_BONUS: f64 = 0.1;

/// Filler tokens dropped from product names before comparison. Whole words
/// only — "news" keeps its "new".
pub const NAME_FILLER_TOKENS: &[&str] = &["the", "new", "mens", "womens", "men's", "women's"];

/// Rows per INSERT statement when appending observations. 9 columns per row
/// must stay under SQLite's default 999 bind-parameter limit.
pub const INSERT_CHUNK_ROWS: usize = 100;

/// Console log ring buffer capacity.
pub const CONSOLE_LOG_CAPACITY: usize = 200;

/// Capacity of the ingest progress channel. Progress is advisory; a full
/// channel drops the event rather than stalling ingestion.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Default row cap for the sessions listing endpoint.
pub const SESSION_LIST_DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "monitor.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
        })
    }
}
