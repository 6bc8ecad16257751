use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::export::{export_all, export_missing};
use crate::compare::Classifier;
use crate::db::{ObservationStore, SessionStore};
use crate::error::{AppError, Result};
use crate::ingest::{IngestService, RawInventoryItem, RawWtbItem};
use crate::ingest::service::IngestOutcome;
use crate::state::console_log::ConsoleEntry;
use crate::state::latency::Percentiles;
use crate::state::result_cache::CachedResult;
use crate::state::scrape_status::StatusSnapshot;
use crate::state::{ConsoleLog, LatencyStats, ResultCache, StatusBoard};
use crate::types::{ClassificationResult, ClassificationSummary, ScrapeSession, SourceKind};

#[derive(Clone)]
pub struct ApiState {
    pub sessions: Arc<SessionStore>,
    pub observations: Arc<ObservationStore>,
    pub classifier: Arc<Classifier>,
    pub ingest: Arc<IngestService>,
    pub status: Arc<StatusBoard>,
    pub console: Arc<ConsoleLog>,
    pub cache: Arc<ResultCache>,
    pub latency: Arc<LatencyStats>,
    /// Process start, for the health endpoint's uptime report.
    pub started: Instant,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(get_status))
        .route("/api/logs", get(get_logs))
        .route("/api/ingest/wtb", post(ingest_wtb))
        .route("/api/ingest/inventory", post(ingest_inventory))
        .route("/api/import/csv", post(import_csv))
        .route("/api/comparison", get(get_comparison))
        .route("/api/comparison/summary", get(get_comparison_summary))
        .route("/api/sessions", get(get_sessions))
        .route("/api/export/missing", get(export_missing))
        .route("/api/export/all", get(export_all))
        .with_state(state)
}

/// Cached default classification: serve the stored value, else compute,
/// record the latency, and store (unless an invalidation raced us).
pub(crate) async fn cached_comparison(state: &ApiState) -> Result<CachedResult> {
    if let Some(cached) = state.cache.peek() {
        return Ok(cached);
    }
    let epoch = state.cache.epoch();
    let started = Instant::now();
    let result = state.classifier.classify(None, None).await?;
    state.latency.record(started.elapsed());
    Ok(state.cache.store_if_current(epoch, result))
}

// ---------------------------------------------------------------------------
// Query param / request structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LogsQuery {
    pub since: Option<u64>,
}

#[derive(Deserialize)]
pub struct ComparisonQuery {
    pub wtb_session: Option<String>,
    pub inventory_session: Option<String>,
}

#[derive(Deserialize)]
pub struct SessionsQuery {
    pub kind: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct IngestRequest<T> {
    pub origin_label: Option<String>,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub database: DatabaseHealth,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub wtb_observations: i64,
    pub inventory_observations: i64,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub scrape_status: StatusSnapshot,
    pub wtb_count: i64,
    pub my_products_count: i64,
}

#[derive(Serialize)]
pub struct LogsResponse {
    pub logs: Vec<ConsoleEntry>,
    pub last_index: u64,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub summary: ClassificationSummary,
    pub computed_at: String,
    pub classify_latency_us: Percentiles,
}

#[derive(Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<ScrapeSession>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let wtb = state.observations.wtb_total_count().await;
    let inventory = state.observations.inventory_total_count().await;
    let connected = wtb.is_ok() && inventory.is_ok();

    Json(HealthResponse {
        status: if connected { "healthy" } else { "unhealthy" },
        timestamp: Utc::now().to_rfc3339(),
        uptime_seconds: state.started.elapsed().as_secs(),
        database: DatabaseHealth {
            connected,
            wtb_observations: wtb.unwrap_or(0),
            inventory_observations: inventory.unwrap_or(0),
        },
    })
}

async fn get_status(State(state): State<ApiState>) -> Result<Json<StatusResponse>> {
    Ok(Json(StatusResponse {
        scrape_status: state.status.snapshot(),
        wtb_count: state.observations.wtb_total_count().await?,
        my_products_count: state.observations.inventory_total_count().await?,
    }))
}

async fn get_logs(
    State(state): State<ApiState>,
    Query(params): Query<LogsQuery>,
) -> Json<LogsResponse> {
    let (logs, last_index) = state.console.since(params.since.unwrap_or(0));
    Json(LogsResponse { logs, last_index })
}

async fn ingest_wtb(
    State(state): State<ApiState>,
    Json(req): Json<IngestRequest<RawWtbItem>>,
) -> Result<Json<IngestOutcome>> {
    let outcome = state.ingest.ingest_wtb(req.origin_label, req.items).await?;
    Ok(Json(outcome))
}

async fn ingest_inventory(
    State(state): State<ApiState>,
    Json(req): Json<IngestRequest<RawInventoryItem>>,
) -> Result<Json<IngestOutcome>> {
    let outcome = state.ingest.ingest_inventory(req.origin_label, req.items).await?;
    Ok(Json(outcome))
}

async fn import_csv(State(state): State<ApiState>, body: String) -> Result<Json<IngestOutcome>> {
    let outcome = state.ingest.import_inventory_csv(&body).await?;
    Ok(Json(outcome))
}

async fn get_comparison(
    State(state): State<ApiState>,
    Query(params): Query<ComparisonQuery>,
) -> Result<Json<ClassificationResult>> {
    // Explicit session ids bypass the cache — only the default
    // latest/latest view is memoized.
    if params.wtb_session.is_some() || params.inventory_session.is_some() {
        let result = state
            .classifier
            .classify(params.wtb_session.as_deref(), params.inventory_session.as_deref())
            .await?;
        return Ok(Json(result));
    }
    Ok(Json(cached_comparison(&state).await?.result))
}

async fn get_comparison_summary(State(state): State<ApiState>) -> Result<Json<SummaryResponse>> {
    let cached = cached_comparison(&state).await?;
    Ok(Json(SummaryResponse {
        summary: cached.result.summary,
        computed_at: cached.computed_at,
        classify_latency_us: state.latency.percentiles(),
    }))
}

async fn get_sessions(
    State(state): State<ApiState>,
    Query(params): Query<SessionsQuery>,
) -> Result<Json<SessionsResponse>> {
    let kind = match params.kind.as_deref() {
        Some(s) => Some(
            SourceKind::parse(s)
                .ok_or_else(|| AppError::InvalidParameter(format!("unknown session kind: {s}")))?,
        ),
        None => None,
    };
    let limit = params
        .limit
        .unwrap_or(crate::config::SESSION_LIST_DEFAULT_LIMIT)
        .clamp(1, 500);

    let sessions = state.sessions.list(kind, limit).await?;
    Ok(Json(SessionsResponse { sessions }))
}
