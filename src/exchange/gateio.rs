//! Gate.io v4 spot adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::error::AdapterError;
use crate::market::{normalize_network, ExchangeId, Instrument, NetworkInfo, Quote};

use super::http::{decimal_or_zero, get_json};
use super::{retain_requested, ExchangeAdapter, QuoteBatch};

const BASE_URL: &str = "https://api.gateio.ws/api/v4";

/// Gate.io public market data and currency chains.
#[derive(Debug, Clone)]
pub struct GateioAdapter {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    currency_pair: String,
    highest_bid: Option<String>,
    lowest_ask: Option<String>,
    base_volume: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrencyChain {
    chain: String,
    #[serde(default)]
    is_disabled: u8,
    #[serde(default)]
    is_deposit_disabled: u8,
    #[serde(default)]
    is_withdraw_disabled: u8,
}

impl GateioAdapter {
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

fn into_quotes(tickers: Vec<Ticker>, wanted: &[Instrument]) -> QuoteBatch {
    let quotes = tickers.into_iter().filter_map(|t| {
        let instrument = t.currency_pair.parse::<Instrument>().ok()?;
        Some(Quote::new(
            ExchangeId::Gateio,
            instrument,
            decimal_or_zero(t.highest_bid.as_deref()),
            decimal_or_zero(t.lowest_ask.as_deref()),
            decimal_or_zero(t.base_volume.as_deref()),
        ))
    });

    retain_requested(quotes, wanted)
}

/// Public chain listing carries no fee; it stays unknown.
fn into_networks(chains: Vec<CurrencyChain>) -> Vec<NetworkInfo> {
    chains
        .into_iter()
        .map(|c| NetworkInfo {
            network: normalize_network(&c.chain),
            withdraw_fee: None,
            withdraw_enabled: c.is_disabled == 0 && c.is_withdraw_disabled == 0,
            deposit_enabled: c.is_disabled == 0 && c.is_deposit_disabled == 0,
        })
        .collect()
}

#[async_trait]
impl ExchangeAdapter for GateioAdapter {
    fn id(&self) -> ExchangeId {
        ExchangeId::Gateio
    }

    fn default_poll_interval(&self) -> Duration {
        Duration::from_secs(5)
    }

    #[instrument(skip(self, instruments), fields(exchange = "GATEIO", requested = instruments.len()))]
    async fn fetch_quotes(&self, instruments: &[Instrument]) -> Result<QuoteBatch, AdapterError> {
        let url = format!("{}/spot/tickers", self.base_url);
        let tickers: Vec<Ticker> = get_json(&self.http, &url, &[]).await?;
        Ok(into_quotes(tickers, instruments))
    }

    #[instrument(skip(self), fields(exchange = "GATEIO"))]
    async fn fetch_network_info(&self, currency: &str) -> Result<Vec<NetworkInfo>, AdapterError> {
        let url = format!("{}/wallet/currency_chains", self.base_url);
        let currency = currency.to_uppercase();
        let chains: Vec<CurrencyChain> =
            get_json(&self.http, &url, &[("currency", currency.as_str())]).await?;
        Ok(into_networks(chains))
    }
}
