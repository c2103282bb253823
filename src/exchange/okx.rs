//! OKX v5 spot adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::instrument;

use crate::error::AdapterError;
use crate::market::{normalize_network, ExchangeId, Instrument, NetworkInfo, Quote};

use super::auth::{self, ApiCredentials};
use super::http::{decimal_or_zero, get_json, get_json_with_headers, optional_decimal};
use super::{retain_requested, ExchangeAdapter, QuoteBatch};

const BASE_URL: &str = "https://www.okx.com";

const RATE_LIMIT_CODE: &str = "50011";

/// 501xx: API key, passphrase, signature or permission problems.
const AUTH_CODE_PREFIX: &str = "501";

const CURRENCIES_PATH: &str = "/api/v5/asset/currencies";

/// OKX market data, plus currency metadata when credentials are set.
#[derive(Debug, Clone)]
pub struct OkxAdapter {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<ApiCredentials>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<Vec<T>, AdapterError> {
        match self.code.as_str() {
            "0" => Ok(self.data),
            RATE_LIMIT_CODE => Err(AdapterError::RateLimited { retry_after: None }),
            code if code.starts_with(AUTH_CODE_PREFIX) => Err(AdapterError::Unauthorized(
                format!("code {}: {}", code, self.msg),
            )),
            code => Err(AdapterError::Malformed(format!("code {}: {}", code, self.msg))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    inst_id: String,
    bid_px: Option<String>,
    ask_px: Option<String>,
    /// 24h volume in base currency.
    vol24h: Option<String>,
}

/// One row per currency and chain.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrencyChain {
    #[serde(default)]
    chain: String,
    #[serde(default)]
    can_dep: bool,
    #[serde(default)]
    can_wd: bool,
    fee: Option<String>,
    /// Newer responses carry the fee here instead.
    min_fee: Option<String>,
}

impl OkxAdapter {
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

    /// Enable the signed currencies endpoint. Needs the passphrase too.
    pub fn with_credentials(mut self, credentials: Option<ApiCredentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

fn into_quotes(envelope: Envelope<Ticker>, wanted: &[Instrument]) -> Result<QuoteBatch, AdapterError> {
    let quotes = envelope.into_data()?.into_iter().filter_map(|t| {
        let instrument = t.inst_id.parse::<Instrument>().ok()?;
        Some(Quote::new(
            ExchangeId::Okx,
            instrument,
            decimal_or_zero(t.bid_px.as_deref()),
            decimal_or_zero(t.ask_px.as_deref()),
            decimal_or_zero(t.vol24h.as_deref()),
        ))
    });

    Ok(retain_requested(quotes, wanted))
}

/// `OK-ACCESS-SIGN` for a body-less GET of `path_and_query`.
fn sign_request(secret: &str, timestamp: &str, path_and_query: &str) -> Result<String, AdapterError> {
    auth::sign_base64(secret, &format!("{}GET{}", timestamp, path_and_query))
}

fn into_networks(envelope: Envelope<CurrencyChain>) -> Result<Vec<NetworkInfo>, AdapterError> {
    Ok(envelope
        .into_data()?
        .into_iter()
        .map(|c| NetworkInfo {
            network: normalize_network(&c.chain),
            withdraw_fee: optional_decimal(c.fee.as_deref())
                .or_else(|| optional_decimal(c.min_fee.as_deref())),
            withdraw_enabled: c.can_wd,
            deposit_enabled: c.can_dep,
        })
        .collect())
}

#[async_trait]
impl ExchangeAdapter for OkxAdapter {
    fn id(&self) -> ExchangeId {
        ExchangeId::Okx
    }

    fn default_poll_interval(&self) -> Duration {
        Duration::from_secs(3)
    }

    #[instrument(skip(self, instruments), fields(exchange = "OKX", requested = instruments.len()))]
    async fn fetch_quotes(&self, instruments: &[Instrument]) -> Result<QuoteBatch, AdapterError> {
        let url = format!("{}/api/v5/market/tickers", self.base_url);
        let envelope: Envelope<Ticker> = get_json(&self.http, &url, &[("instType", "SPOT")]).await?;
        into_quotes(envelope, instruments)
    }

    #[instrument(skip(self), fields(exchange = "OKX"))]
    async fn fetch_network_info(&self, currency: &str) -> Result<Vec<NetworkInfo>, AdapterError> {
        let Some((creds, passphrase)) = self
            .credentials
            .as_ref()
            .and_then(|c| c.passphrase.as_deref().map(|p| (c, p)))
        else {
            return Err(AdapterError::Unavailable(
                "okx network info requires OKX_API_KEY, OKX_API_SECRET and OKX_API_PASSPHRASE"
                    .to_string(),
            ));
        };

        let ccy = currency.to_uppercase();
        let timestamp = auth::okx_timestamp(OffsetDateTime::now_utc())?;
        let signature = sign_request(
            &creds.secret,
            &timestamp,
            &format!("{}?ccy={}", CURRENCIES_PATH, ccy),
        )?;

        let url = format!("{}{}", self.base_url, CURRENCIES_PATH);
        let headers = [
            ("OK-ACCESS-KEY", creds.key.as_str()),
            ("OK-ACCESS-SIGN", signature.as_str()),
            ("OK-ACCESS-TIMESTAMP", timestamp.as_str()),
            ("OK-ACCESS-PASSPHRASE", passphrase),
        ];
        let envelope: Envelope<CurrencyChain> =
            get_json_with_headers(&self.http, &url, &[("ccy", ccy.as_str())], &headers).await?;
        into_networks(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_spot_tickers() {
        let raw = r#"{
            "code": "0",
            "msg": "",
            "data": [
                {"instType": "SPOT", "instId": "SOL-USDC", "bidPx": "150.01", "askPx": "150.03", "vol24h": "88000"}
            ]
        }"#;
        let envelope: Envelope<Ticker> = serde_json::from_str(raw).unwrap();
        let batch = into_quotes(envelope, &[]).unwrap();

        let quote = &batch[&"SOL/USDC".parse::<Instrument>().unwrap()];
        assert_eq!(quote.exchange, ExchangeId::Okx);
        assert_eq!(quote.best_bid, dec!(150.01));
        assert_eq!(quote.volume, dec!(88000));
    }

    #[test]
    fn nonzero_code_is_an_error() {
        let envelope: Envelope<Ticker> =
            serde_json::from_str(r#"{"code": "50011", "msg": "Too Many Requests", "data": []}"#)
                .unwrap();
        assert!(into_quotes(envelope, &[]).unwrap_err().is_rate_limited());

        let envelope: Envelope<Ticker> =
            serde_json::from_str(r#"{"code": "51001", "msg": "Instrument ID does not exist"}"#)
                .unwrap();
        assert_eq!(into_quotes(envelope, &[]).unwrap_err().kind(), "malformed");
    }

    #[test]
    fn parses_currency_chains() {
        let raw = r#"{
            "code": "0",
            "msg": "",
            "data": [
                {"ccy": "USDT", "chain": "USDT-TRC20", "canDep": true, "canWd": true, "fee": "1.5"},
                {"ccy": "USDT", "chain": "USDT-ERC20", "canDep": true, "canWd": false, "minFee": "3.2"},
                {"ccy": "USDT", "chain": "USDT-Aptos", "canDep": false, "canWd": false}
            ]
        }"#;
        let envelope: Envelope<CurrencyChain> = serde_json::from_str(raw).unwrap();
        let networks = into_networks(envelope).unwrap();

        assert_eq!(networks.len(), 3);
        assert_eq!(networks[0].network, "TRC20");
        assert_eq!(networks[0].withdraw_fee, Some(dec!(1.5)));
        assert!(networks[0].withdraw_enabled);
        assert_eq!(networks[1].network, "ERC20");
        assert_eq!(networks[1].withdraw_fee, Some(dec!(3.2)));
        assert!(!networks[1].withdraw_enabled && networks[1].deposit_enabled);
        assert_eq!(networks[2].withdraw_fee, None);
    }

    #[test]
    fn signature_is_base64_over_timestamp_method_and_path() {
        assert_eq!(
            sign_request(
                "okx-secret",
                "2023-11-14T22:13:20.000Z",
                "/api/v5/asset/currencies?ccy=USDT"
            )
            .unwrap(),
            "snIibxC+AoxPX/gU7XkJiu7y/jPTMuslK8+yGclgj7Y="
        );
    }

    #[test]
    fn bad_passphrase_is_unauthorized() {
        let envelope: Envelope<CurrencyChain> =
            serde_json::from_str(r#"{"code": "50105", "msg": "Your OK-ACCESS-PASSPHRASE is incorrect.", "data": []}"#)
                .unwrap();
        assert_eq!(into_networks(envelope).unwrap_err().kind(), "unauthorized");
    }

    #[tokio::test]
    async fn network_info_needs_passphrase() {
        let adapter = OkxAdapter::new(reqwest::Client::new())
            .with_credentials(Some(ApiCredentials::new("key", "secret")));
        let err = adapter.fetch_network_info("USDT").await.unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }
}
