//! MEXC v3 spot adapter.

use async_trait::async_trait;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::instrument;

use crate::error::AdapterError;
use crate::market::{normalize_network, ExchangeId, Instrument, NetworkInfo, Quote};

use super::auth::{self, ApiCredentials, RECV_WINDOW_MS};
use super::http::{decimal_or_zero, get_json, get_json_with_headers, optional_decimal};
use super::{retain_requested, ExchangeAdapter, QuoteBatch};

const BASE_URL: &str = "https://api.mexc.com";

/// MEXC market data, plus coin configs when credentials are set.
#[derive(Debug, Clone)]
pub struct MexcAdapter {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<ApiCredentials>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    symbol: String,
    bid_price: Option<String>,
    ask_price: Option<String>,
    volume: Option<String>,
}

/// Entry of `capital/config/getall`; one per coin.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinConfig {
    coin: String,
    #[serde(default)]
    network_list: Vec<CoinNetwork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinNetwork {
    network: Option<String>,
    /// Older spelling, still sent alongside `network` for some coins.
    #[serde(rename = "netWork")]
    net_work: Option<String>,
    #[serde(default)]
    deposit_enable: bool,
    #[serde(default)]
    withdraw_enable: bool,
    withdraw_fee: Option<String>,
}

impl MexcAdapter {
    /// Create an adapter against the public API.
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
            credentials: None,
        }
    }

    /// Point the adapter at another host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Enable the signed coin-config endpoint.
    pub fn with_credentials(mut self, credentials: Option<ApiCredentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

fn into_quotes(tickers: Vec<Ticker>, wanted: &[Instrument]) -> QuoteBatch {
    let quotes = tickers.into_iter().filter_map(|t| {
        let instrument = t.symbol.parse::<Instrument>().ok()?;
        Some(Quote::new(
            ExchangeId::Mexc,
            instrument,
            decimal_or_zero(t.bid_price.as_deref()),
            decimal_or_zero(t.ask_price.as_deref()),
            decimal_or_zero(t.volume.as_deref()),
        ))
    });

    retain_requested(quotes, wanted)
}

/// Query string MEXC signs, without the signature itself.
fn signed_params(timestamp: &str) -> String {
    format!("timestamp={}&recvWindow={}", timestamp, RECV_WINDOW_MS)
}

/// Networks of `coin`; the endpoint returns every coin at once.
fn into_networks(configs: Vec<CoinConfig>, coin: &str) -> Vec<NetworkInfo> {
    configs
        .into_iter()
        .find(|c| c.coin.eq_ignore_ascii_case(coin))
        .map(|c| c.network_list)
        .unwrap_or_default()
        .into_iter()
        .map(|n| {
            let name = n.network.or(n.net_work).unwrap_or_default();
            NetworkInfo {
                network: normalize_network(&name),
                withdraw_fee: optional_decimal(n.withdraw_fee.as_deref()),
                withdraw_enabled: n.withdraw_enable,
                deposit_enabled: n.deposit_enable,
            }
        })
        .collect()
}

#[async_trait]
impl ExchangeAdapter for MexcAdapter {
    fn id(&self) -> ExchangeId {
        ExchangeId::Mexc
    }

    #[instrument(skip(self, instruments), fields(exchange = "MEXC", requested = instruments.len()))]
    async fn fetch_quotes(&self, instruments: &[Instrument]) -> Result<QuoteBatch, AdapterError> {
        // 24hr ticker carries bid/ask and volume in one payload
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let tickers: Vec<Ticker> = get_json(&self.http, &url, &[]).await?;
        Ok(into_quotes(tickers, instruments))
    }

    #[instrument(skip(self), fields(exchange = "MEXC"))]
    async fn fetch_network_info(&self, currency: &str) -> Result<Vec<NetworkInfo>, AdapterError> {
        let Some(creds) = &self.credentials else {
            return Err(AdapterError::Unavailable(
                "mexc network info requires MEXC_API_KEY and MEXC_API_SECRET".to_string(),
            ));
        };

        let timestamp = auth::timestamp_millis(OffsetDateTime::now_utc());
        let signature = auth::sign_hex(&creds.secret, &signed_params(&timestamp))?;

        let url = format!("{}/api/v3/capital/config/getall", self.base_url);
        let query = [
            ("timestamp", timestamp.as_str()),
            ("recvWindow", RECV_WINDOW_MS),
            ("signature", signature.as_str()),
        ];
        let configs: Vec<CoinConfig> =
            get_json_with_headers(&self.http, &url, &query, &[("X-MEXC-APIKEY", creds.key.as_str())])
                .await?;
        Ok(into_networks(configs, currency))
    }
}
