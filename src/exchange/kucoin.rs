//! KuCoin spot adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::error::AdapterError;
use crate::market::{normalize_network, ExchangeId, Instrument, NetworkInfo, Quote};

use super::http::{decimal_or_zero, get_json, optional_decimal};
use super::{retain_requested, ExchangeAdapter, QuoteBatch};

const BASE_URL: &str = "https://api.kucoin.com";

const OK_CODE: &str = "200000";
const RATE_LIMIT_CODE: &str = "429000";

/// KuCoin public market data and currency metadata.
#[derive(Debug, Clone)]
pub struct KucoinAdapter {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, AdapterError> {
        match self.code.as_str() {
            OK_CODE => self
                .data
                .ok_or_else(|| AdapterError::Malformed("missing data".to_string())),
            RATE_LIMIT_CODE => Err(AdapterError::RateLimited { retry_after: None }),
            code => Err(AdapterError::Malformed(format!(
                "code {}: {}",
                code,
                self.msg.unwrap_or_default()
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AllTickers {
    #[serde(default)]
    ticker: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    symbol: String,
    /// Best bid.
    buy: Option<String>,
    /// Best ask.
    sell: Option<String>,
    vol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Currency {
    #[serde(default)]
    chains: Vec<Chain>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Chain {
    chain_name: String,
    withdrawal_min_fee: Option<String>,
    #[serde(default)]
    is_withdraw_enabled: bool,
    #[serde(default)]
    is_deposit_enabled: bool,
}

impl KucoinAdapter {
    /// Create an adapter against the public API.
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the adapter at another host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn into_quotes(tickers: AllTickers, wanted: &[Instrument]) -> QuoteBatch {
    let quotes = tickers.ticker.into_iter().filter_map(|t| {
        let instrument = t.symbol.parse::<Instrument>().ok()?;
        Some(Quote::new(
            ExchangeId::Kucoin,
            instrument,
            decimal_or_zero(t.buy.as_deref()),
            decimal_or_zero(t.sell.as_deref()),
            decimal_or_zero(t.vol.as_deref()),
        ))
    });

    retain_requested(quotes, wanted)
}

fn into_networks(currency: Currency) -> Vec<NetworkInfo> {
    currency
        .chains
        .into_iter()
        .map(|c| NetworkInfo {
            network: normalize_network(&c.chain_name),
            withdraw_fee: optional_decimal(c.withdrawal_min_fee.as_deref()),
            withdraw_enabled: c.is_withdraw_enabled,
            deposit_enabled: c.is_deposit_enabled,
        })
        .collect()
}

#[async_trait]
impl ExchangeAdapter for KucoinAdapter {
    fn id(&self) -> ExchangeId {
        ExchangeId::Kucoin
    }

    // allTickers is a multi-megabyte payload
    fn default_poll_interval(&self) -> Duration {
        Duration::from_secs(5)
    }

    #[instrument(skip(self, instruments), fields(exchange = "KUCOIN", requested = instruments.len()))]
    async fn fetch_quotes(&self, instruments: &[Instrument]) -> Result<QuoteBatch, AdapterError> {
        let url = format!("{}/api/v1/market/allTickers", self.base_url);
        let envelope: Envelope<AllTickers> = get_json(&self.http, &url, &[]).await?;
        Ok(into_quotes(envelope.into_data()?, instruments))
    }

    #[instrument(skip(self), fields(exchange = "KUCOIN"))]
    async fn fetch_network_info(&self, currency: &str) -> Result<Vec<NetworkInfo>, AdapterError> {
        let url = format!("{}/api/v3/currencies/{}", self.base_url, currency.to_uppercase());
        let envelope: Envelope<Currency> = get_json(&self.http, &url, &[]).await?;
        Ok(into_networks(envelope.into_data()?))
    }
}
