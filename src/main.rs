use std::sync::Arc;
use std::time::Instant;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wtb_monitor::api::{router, ApiState};
use wtb_monitor::compare::Classifier;
use wtb_monitor::config::{Config, PROGRESS_CHANNEL_CAPACITY};
use wtb_monitor::db::{ObservationStore, SessionStore};
use wtb_monitor::error::Result;
use wtb_monitor::ingest::{spawn_consumer, IngestService};
use wtb_monitor::state::{ConsoleLog, LatencyStats, ResultCache, StatusBoard};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let options = SqliteConnectOptions::new()
        .filename(&cfg.db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Shared process state ---
    let status = Arc::new(StatusBoard::new());
    let console = Arc::new(ConsoleLog::new());
    let cache = Arc::new(ResultCache::new());
    let latency = Arc::new(LatencyStats::new());

    // Ingest progress events: single consumer mirrors them into the status
    // board and the console buffer.
    let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    spawn_consumer(progress_rx, Arc::clone(&status), Arc::clone(&console));

    let ingest = IngestService::new(
        pool.clone(),
        Arc::clone(&status),
        Arc::clone(&cache),
        progress_tx,
    );

    let state = ApiState {
        sessions: Arc::new(SessionStore::new(pool.clone())),
        observations: Arc::new(ObservationStore::new(pool.clone())),
        classifier: Arc::new(Classifier::new(pool.clone())),
        ingest: Arc::new(ingest),
        status,
        console,
        cache,
        latency,
        started: Instant::now(),
    };

    // --- HTTP API server ---
    let app = router(state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
