//! End-to-end scenarios over mock exchanges.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower::ServiceExt;

use spread_scanner::api::{create_router, AppState};
use spread_scanner::error::AdapterError;
use spread_scanner::exchange::MockFailure;
use spread_scanner::market::{ExchangeId, NetworkInfo};
use spread_scanner::scanner::ScanConfig;
use spread_scanner::spread::FilterCriteria;
use spread_scanner::Config;

use crate::common::Harness;

const X: ExchangeId = ExchangeId::Mexc;
const Y: ExchangeId = ExchangeId::Bybit;

/// X asks 100 with volume 10, Y bids 105 with volume 5.
async fn scenario_a_market() -> Harness {
    let mut h = Harness::new(&[X, Y]);
    h.mock(X).set_quote("BTCUSDT", dec!(99.50), dec!(100.00), dec!(10));
    h.mock(Y).set_quote("BTCUSDT", dec!(105.00), dec!(105.50), dec!(5));
    h.poll_all().await;
    h
}

fn zero_filter() -> FilterCriteria {
    FilterCriteria {
        min_profit_percent: Some(dec!(0)),
        min_volume: Some(dec!(0)),
        ..Default::default()
    }
}

fn app(h: &Harness) -> axum::Router {
    let scan_config = Arc::new(RwLock::new(ScanConfig::from_config(&Config::default())));
    create_router(AppState::new(h.facade.clone(), scan_config))
}

async fn get_json(app: axum::Router, uri: &str) -> Value {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn scenario_a_single_opportunity() {
    let h = scenario_a_market().await;

    let result = h.facade.best_spreads(&zero_filter()).await.unwrap();

    assert_eq!(result.len(), 1);
    let opp = &result[0];
    assert_eq!(opp.buy_exchange, X);
    assert_eq!(opp.sell_exchange, Y);
    assert_eq!(opp.buy_price, dec!(100.00));
    assert_eq!(opp.sell_price, dec!(105.00));
    assert_eq!(opp.spread_percentage, dec!(5));
    assert_eq!(opp.id, "BTC/USDT:MEXC->BYBIT");
}

#[tokio::test]
async fn scenario_b_volume_floor_excludes() {
    let h = scenario_a_market().await;

    let criteria = FilterCriteria {
        min_volume: Some(dec!(6)),
        ..zero_filter()
    };

    assert!(h.facade.best_spreads(&criteria).await.unwrap().is_empty());
}

#[tokio::test]
async fn scenario_c_degraded_exchange_is_excluded_until_success() {
    let mut h = scenario_a_market().await;
    assert_eq!(h.facade.best_spreads(&zero_filter()).await.unwrap().len(), 1);

    h.mock(Y)
        .inject(MockFailure::Always(AdapterError::Unavailable("503".into())));

    // Two failures: still below the threshold, last quotes remain usable.
    h.poll(Y).await;
    h.poll(Y).await;
    assert_eq!(h.facade.best_spreads(&zero_filter()).await.unwrap().len(), 1);

    h.poll(Y).await;
    assert!(h.store.is_degraded(Y).unwrap());
    assert!(h.facade.best_spreads(&zero_filter()).await.unwrap().is_empty());

    let health = h.health.get(Y).unwrap();
    assert!(health.degraded);
    assert_eq!(health.consecutive_failures, 3);

    // Still registered.
    let exchanges = get_json(app(&h), "/api/v1/scanner/available-exchanges").await;
    assert_eq!(exchanges, json!(["BYBIT", "MEXC"]));

    h.mock(Y).clear_failures();
    h.poll(Y).await;
    assert!(!h.store.is_degraded(Y).unwrap());
    assert_eq!(h.facade.best_spreads(&zero_filter()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn scenario_d_blacklist_wins_over_whitelist() {
    let mut h = Harness::new(&[X, Y]);
    h.mock(X).set_quote("BTCUSDT", dec!(99), dec!(100), dec!(10));
    h.mock(Y).set_quote("BTCUSDT", dec!(105), dec!(106), dec!(10));
    h.mock(X).set_quote("ETHUSDT", dec!(9), dec!(10), dec!(10));
    h.mock(Y).set_quote("ETHUSDT", dec!(11), dec!(12), dec!(10));
    h.poll_all().await;

    let criteria = FilterCriteria {
        whitelist: vec!["BTCUSDT".into()],
        blacklist: vec!["BTCUSDT".into()],
        ..zero_filter()
    };
    assert!(h.facade.best_spreads(&criteria).await.unwrap().is_empty());

    let criteria = FilterCriteria {
        blacklist: vec!["BTC/USDT".into()],
        ..zero_filter()
    };
    let result = h.facade.best_spreads(&criteria).await.unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].instrument.symbol(), "ETH/USDT");
}

#[tokio::test]
async fn scenario_e_network_timeout_keeps_opportunity() {
    let latency = HashMap::from([(X, Duration::from_millis(500))]);
    let mut h = Harness::with_network_latency(&[X, Y], latency);
    h.mock(X).set_quote("BTCUSDT", dec!(99.50), dec!(100.00), dec!(10));
    h.mock(Y).set_quote("BTCUSDT", dec!(105.00), dec!(105.50), dec!(5));
    h.mock(Y).set_networks(
        "BTC",
        vec![NetworkInfo {
            network: "BTC".into(),
            withdraw_fee: None,
            withdraw_enabled: true,
            deposit_enabled: true,
        }],
    );
    h.poll_all().await;

    let result = h.facade.best_spreads(&zero_filter()).await.unwrap();

    assert_eq!(result.len(), 1);
    let opp = &result[0];
    assert!(!opp.buy_trading_info.available);
    assert!(opp.buy_trading_info.networks.is_empty());
    assert!(opp.sell_trading_info.available);

    let json = serde_json::to_value(opp).unwrap();
    assert_eq!(json["buyTradingInfo"]["networks"], json!([]));
    assert_eq!(json["sellTradingInfo"]["networks"][0]["withdrawFee"], json!(-1.0));
    assert_eq!(json["sellTradingInfo"]["networks"][0]["depositEnabled"], json!(true));
}

#[tokio::test]
async fn available_pairs_over_http() {
    let mut h = Harness::new(&[X, Y]);
    h.mock(X).set_quote("SOL_USDT", dec!(1), dec!(2), dec!(1));
    h.mock(Y).set_quote("BTCUSDT", dec!(1), dec!(2), dec!(1));
    h.poll_all().await;

    let pairs = get_json(app(&h), "/api/v1/scanner/available-pairs").await;
    assert_eq!(pairs, json!(["BTC/USDT", "SOL/USDT"]));
}
