//! Bybit v5 spot adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::instrument;

use crate::error::AdapterError;
use crate::market::{normalize_network, ExchangeId, Instrument, NetworkInfo, Quote};

use super::auth::{self, ApiCredentials, RECV_WINDOW_MS};
use super::http::{decimal_or_zero, get_json, get_json_with_headers, optional_decimal};
use super::{retain_requested, ExchangeAdapter, QuoteBatch};

const BASE_URL: &str = "https://api.bybit.com";

/// `retCode` Bybit uses for "too many visits".
const RATE_LIMIT_CODE: i64 = 10006;

/// Invalid key, bad signature, or a key without the required permission.
const AUTH_CODES: [i64; 3] = [10003, 10004, 10005];

/// Bybit market data, plus coin metadata when credentials are set.
#[derive(Debug, Clone)]
pub struct BybitAdapter {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<ApiCredentials>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<T>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, AdapterError> {
        match self.ret_code {
            0 => self
                .result
                .ok_or_else(|| AdapterError::Malformed("missing result".to_string())),
            RATE_LIMIT_CODE => Err(AdapterError::RateLimited { retry_after: None }),
            code if AUTH_CODES.contains(&code) => Err(AdapterError::Unauthorized(format!(
                "retCode {}: {}",
                code, self.ret_msg
            ))),
            code => Err(AdapterError::Malformed(format!(
                "retCode {}: {}",
                code, self.ret_msg
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TickerList {
    #[serde(default)]
    list: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    symbol: String,
    bid1_price: Option<String>,
    ask1_price: Option<String>,
    volume24h: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoinRows {
    #[serde(default)]
    rows: Vec<CoinRow>,
}

#[derive(Debug, Deserialize)]
struct CoinRow {
    #[serde(default)]
    chains: Vec<Chain>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Chain {
    chain_type: Option<String>,
    #[serde(default)]
    chain: String,
    withdraw_fee: Option<String>,
    /// "1" when enabled.
    chain_deposit: Option<String>,
    chain_withdraw: Option<String>,
}

impl BybitAdapter {
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

    /// Enable the signed coin-info endpoint.
    pub fn with_credentials(mut self, credentials: Option<ApiCredentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

fn into_quotes(envelope: Envelope<TickerList>, wanted: &[Instrument]) -> Result<QuoteBatch, AdapterError> {
    let tickers = envelope.into_result()?.list;

    let quotes = tickers.into_iter().filter_map(|t| {
        let instrument = t.symbol.parse::<Instrument>().ok()?;
        Some(Quote::new(
            ExchangeId::Bybit,
            instrument,
            decimal_or_zero(t.bid1_price.as_deref()),
            decimal_or_zero(t.ask1_price.as_deref()),
            decimal_or_zero(t.volume24h.as_deref()),
        ))
    });

    Ok(retain_requested(quotes, wanted))
}

/// `X-BAPI-SIGN` for a GET with `query`: HMAC over timestamp, key, window and query.
fn sign_request(creds: &ApiCredentials, timestamp: &str, query: &str) -> Result<String, AdapterError> {
    let payload = format!("{}{}{}{}", timestamp, creds.key, RECV_WINDOW_MS, query);
    auth::sign_hex(&creds.secret, &payload)
}

fn into_networks(envelope: Envelope<CoinRows>) -> Result<Vec<NetworkInfo>, AdapterError> {
    let chains = envelope
        .into_result()?
        .rows
        .into_iter()
        .next()
        .map(|row| row.chains)
        .unwrap_or_default();

    Ok(chains
        .into_iter()
        .map(|c| {
            let name = c.chain_type.filter(|t| !t.is_empty()).unwrap_or(c.chain);
            NetworkInfo {
                network: normalize_network(&name),
                withdraw_fee: optional_decimal(c.withdraw_fee.as_deref()),
                withdraw_enabled: c.chain_withdraw.as_deref() == Some("1"),
                deposit_enabled: c.chain_deposit.as_deref() == Some("1"),
            }
        })
        .collect())
}

#[async_trait]
impl ExchangeAdapter for BybitAdapter {
    fn id(&self) -> ExchangeId {
        ExchangeId::Bybit
    }

    fn default_poll_interval(&self) -> Duration {
        Duration::from_secs(3)
    }

    #[instrument(skip(self, instruments), fields(exchange = "BYBIT", requested = instruments.len()))]
    async fn fetch_quotes(&self, instruments: &[Instrument]) -> Result<QuoteBatch, AdapterError> {
        let url = format!("{}/v5/market/tickers", self.base_url);
        let envelope: Envelope<TickerList> = get_json(&self.http, &url, &[("category", "spot")]).await?;
        into_quotes(envelope, instruments)
    }

    #[instrument(skip(self), fields(exchange = "BYBIT"))]
    async fn fetch_network_info(&self, currency: &str) -> Result<Vec<NetworkInfo>, AdapterError> {
        let Some(creds) = &self.credentials else {
            return Err(AdapterError::Unavailable(
                "bybit network info requires BYBIT_API_KEY and BYBIT_API_SECRET".to_string(),
            ));
        };

        let coin = currency.to_uppercase();
        let timestamp = auth::timestamp_millis(OffsetDateTime::now_utc());
        let signature = sign_request(creds, &timestamp, &format!("coin={}", coin))?;

        let url = format!("{}/v5/asset/coin/query-info", self.base_url);
        let headers = [
            ("X-BAPI-API-KEY", creds.key.as_str()),
            ("X-BAPI-TIMESTAMP", timestamp.as_str()),
            ("X-BAPI-RECV-WINDOW", RECV_WINDOW_MS),
            ("X-BAPI-SIGN", signature.as_str()),
        ];
        let envelope: Envelope<CoinRows> =
            get_json_with_headers(&self.http, &url, &[("coin", coin.as_str())], &headers).await?;
        into_networks(envelope)
    }
}
