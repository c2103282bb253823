//! HTTP API handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::error::QueryError;
use crate::market::ExchangeId;
use crate::metrics;
use crate::poller::AdapterHealth;
use crate::scanner::{QueryFacade, ScanConfig};
use crate::spread::{FilterCriteria, SpreadOpportunity};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Read path over the quote store.
    pub facade: Arc<QueryFacade>,
    /// Settings of the background scanner.
    pub scan_config: Arc<RwLock<ScanConfig>>,
    /// Prometheus exporter, absent when no recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(facade: Arc<QueryFacade>, scan_config: Arc<RwLock<ScanConfig>>) -> Self {
        Self {
            facade,
            scan_config,
            prometheus: None,
        }
    }

    /// Attach the Prometheus handle served on `/metrics`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether any exchange has published quotes.
    pub ready: bool,
}

/// Error body for rejected requests.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable kind, e.g. `invalid_filter`.
    pub error: &'static str,
    /// What was wrong.
    pub message: String,
}

impl ErrorResponse {
    fn bad_request(error: &'static str, message: impl Into<String>) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(Self {
                error,
                message: message.into(),
            }),
        )
            .into_response()
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        match self {
            QueryError::InvalidFilter(reason) => ErrorResponse::bad_request("invalid_filter", reason),
        }
    }
}

fn rejected_body(rejection: JsonRejection) -> Response {
    metrics::inc_queries_rejected();
    ErrorResponse::bad_request("invalid_request", rejection.body_text())
}

/// Health check handler - always returns 200.
#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, body = HealthResponse)))]
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - 200 once quotes exist, 503 otherwise.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, body = ReadyResponse),
        (status = 503, body = ReadyResponse)
    )
)]
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.facade.is_ready();
    let response = ReadyResponse { ready };

    if ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Per-exchange poll health.
#[utoipa::path(get, path = "/api/v1/status", tag = "health", responses((status = 200, body = [AdapterHealth])))]
pub async fn status(State(state): State<AppState>) -> Json<Vec<AdapterHealth>> {
    Json(state.facade.exchange_status())
}

/// Registered exchanges, healthy or not.
#[utoipa::path(
    get,
    path = "/api/v1/scanner/available-exchanges",
    tag = "scanner",
    responses((status = 200, body = [ExchangeId]))
)]
pub async fn available_exchanges(State(state): State<AppState>) -> Json<Vec<ExchangeId>> {
    let start = Instant::now();
    let exchanges = state.facade.available_exchanges();
    metrics::record_http_latency(start, "available_exchanges");
    Json(exchanges)
}

/// Instrument symbols known across all exchanges.
#[utoipa::path(
    get,
    path = "/api/v1/scanner/available-pairs",
    tag = "scanner",
    responses((status = 200, body = [String], example = json!(["BTC/USDT", "ETH/USDT"])))
)]
pub async fn available_pairs(State(state): State<AppState>) -> Json<Vec<String>> {
    let start = Instant::now();
    let pairs = state.facade.available_pairs();
    metrics::record_http_latency(start, "available_pairs");
    Json(pairs)
}

/// Ranked spread opportunities for the given filter.
#[utoipa::path(
    post,
    path = "/api/v1/spreads/best-spreads",
    tag = "spreads",
    request_body = FilterCriteria,
    responses(
        (status = 200, body = [SpreadOpportunity]),
        (status = 400, body = ErrorResponse)
    )
)]
pub async fn best_spreads(
    State(state): State<AppState>,
    body: Result<Json<FilterCriteria>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let criteria = match body {
        Ok(Json(criteria)) => criteria,
        Err(rejection) => return rejected_body(rejection),
    };

    let response = match state.facade.best_spreads(&criteria).await {
        Ok(opportunities) => Json(opportunities).into_response(),
        Err(e) => e.into_response(),
    };
    metrics::record_http_latency(start, "best_spreads");
    response
}

/// Current scanner settings.
#[utoipa::path(get, path = "/api/v1/scanner/config", tag = "scanner", responses((status = 200, body = ScanConfig)))]
pub async fn get_scan_config(State(state): State<AppState>) -> Json<ScanConfig> {
    Json(state.scan_config.read().await.clone())
}

/// Replace scanner settings; takes effect on the next scan.
#[utoipa::path(
    post,
    path = "/api/v1/scanner/config",
    tag = "scanner",
    request_body = ScanConfig,
    responses(
        (status = 200, body = ScanConfig),
        (status = 400, body = ErrorResponse)
    )
)]
pub async fn update_scan_config(
    State(state): State<AppState>,
    body: Result<Json<ScanConfig>, JsonRejection>,
) -> Response {
    let config = match body {
        Ok(Json(config)) => config,
        Err(rejection) => return rejected_body(rejection),
    };
    if let Err(e) = config.validate() {
        return e.into_response();
    }

    tracing::info!(
        enabled = config.enabled,
        threshold = %config.notify_threshold_percent,
        "Scanner config updated"
    );
    *state.scan_config.write().await = config.clone();
    Json(config).into_response()
}

/// Prometheus text exposition.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
