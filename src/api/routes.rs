//! HTTP API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{
    self, available_exchanges, available_pairs, best_spreads, get_scan_config, health, metrics_handler,
    ready, status, update_scan_config, AppState,
};

/// OpenAPI document for the public endpoints.
#[derive(OpenApi)]
#[openapi(
    info(title = "Spread Scanner API", description = "Cross-exchange spread opportunities"),
    paths(
        handlers::health,
        handlers::ready,
        handlers::status,
        handlers::available_exchanges,
        handlers::available_pairs,
        handlers::best_spreads,
        handlers::get_scan_config,
        handlers::update_scan_config,
    ),
    tags(
        (name = "health", description = "Liveness and adapter health"),
        (name = "scanner", description = "Exchange and pair listings, scanner settings"),
        (name = "spreads", description = "Spread queries")
    )
)]
pub struct ApiDoc;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/api/v1/status", get(status))
        // Scanner
        .route("/api/v1/scanner/available-exchanges", get(available_exchanges))
        .route("/api/v1/scanner/available-pairs", get(available_pairs))
        .route("/api/v1/scanner/config", get(get_scan_config).post(update_scan_config))
        // Spreads
        .route("/api/v1/spreads/best-spreads", post(best_spreads))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{MockAdapter, SharedAdapter};
    use crate::market::{ExchangeId, Instrument, Quote};
    use crate::network::{EnricherSettings, NetworkEnricher};
    use crate::poller::HealthRegistry;
    use crate::scanner::{QueryFacade, ScanConfig};
    use crate::spread::SpreadCalculator;
    use crate::store::QuoteStore;
    use crate::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    fn state() -> (AppState, Arc<QuoteStore>) {
        let ids = [ExchangeId::Bybit, ExchangeId::Kucoin];
        let store = Arc::new(QuoteStore::new(ids));
        let adapters: Vec<SharedAdapter> = ids
            .iter()
            .map(|&id| Arc::new(MockAdapter::new(id)) as SharedAdapter)
            .collect();
        let enricher = Arc::new(NetworkEnricher::new(
            adapters,
            EnricherSettings {
                success_ttl: Duration::from_secs(60),
                failure_ttl: Duration::from_secs(1),
                timeout: Duration::from_millis(200),
                concurrency: 2,
            },
        ));
        let facade = Arc::new(QueryFacade::new(
            store.clone(),
            SpreadCalculator::new(Duration::from_secs(30)),
            enricher,
            HealthRegistry::new(),
            4,
        ));
        let scan_config = Arc::new(RwLock::new(ScanConfig::from_config(&Config::default())));
        (AppState::new(facade, scan_config), store)
    }

    fn seed(store: &QuoteStore) {
        for (exchange, bid, ask, volume) in [
            (ExchangeId::Bybit, dec!(99), dec!(100), dec!(10)),
            (ExchangeId::Kucoin, dec!(105), dec!(106), dec!(5)),
        ] {
            let instrument: Instrument = "BTCUSDT".parse().unwrap();
            store
                .publish(
                    exchange,
                    HashMap::from([(
                        instrument.clone(),
                        Quote::new(exchange, instrument, bid, ask, volume),
                    )]),
                )
                .unwrap();
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (state, _) = state();
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_endpoint_follows_store() {
        let (state, store) = state();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        seed(&store);
        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn available_exchanges_lists_registered() {
        let (state, _) = state();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/scanner/available-exchanges")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!(["BYBIT", "KUCOIN"]));
    }

    #[tokio::test]
    async fn best_spreads_returns_ranked_opportunities() {
        let (state, store) = state();
        seed(&store);
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/api/v1/spreads/best-spreads",
                json!({"minProfitPercent": 0, "minVolume": 0, "whitelist": [], "blacklist": []}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let opportunities = body.as_array().unwrap();
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0]["buyExchange"], "BYBIT");
        assert_eq!(opportunities[0]["sellExchange"], "KUCOIN");
        assert_eq!(opportunities[0]["spreadPercentage"], json!(5.0));
        assert_eq!(opportunities[0]["instrument"], "BTC/USDT");
    }

    #[tokio::test]
    async fn invalid_filter_is_400() {
        let (state, _) = state();
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/api/v1/spreads/best-spreads",
                json!({"minProfitPercent": 10, "maxProfitPercent": 1}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_filter");
        assert!(body["message"].as_str().unwrap().contains("maxProfitPercent"));
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let (state, _) = state();
        let app = create_router(state);

        let response = app
            .oneshot(post_json("/api/v1/spreads/best-spreads", json!({"minVolume": "lots"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_request");
    }

    #[tokio::test]
    async fn empty_result_is_200_empty_array() {
        let (state, _) = state();
        let app = create_router(state);

        let response = app
            .oneshot(post_json("/api/v1/spreads/best-spreads", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn scanner_config_round_trip() {
        let (state, _) = state();
        let handle = state.scan_config.clone();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/scanner/config",
                json!({"enabled": false, "notifyThresholdPercent": 2.5, "criteria": {"minProfitPercent": 2.5}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!handle.read().await.enabled);
        assert_eq!(handle.read().await.notify_threshold_percent, dec!(2.5));

        let response = app
            .oneshot(post_json(
                "/api/v1/scanner/config",
                json!({"enabled": true, "notifyThresholdPercent": -1}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!handle.read().await.enabled);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let (state, _) = state();
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/api-docs/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let doc = body_json(response).await;
        assert!(doc["paths"]["/api/v1/spreads/best-spreads"]["post"].is_object());
    }
}
