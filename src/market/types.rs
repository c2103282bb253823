//! Market data types: exchanges, instruments, quotes, and transfer networks.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Supported exchange. Adapters are registered per id at startup.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ExchangeId {
    /// Bybit spot.
    Bybit,
    /// KuCoin spot.
    Kucoin,
    /// Gate.io spot.
    Gateio,
    /// OKX spot.
    Okx,
    /// MEXC spot.
    Mexc,
}

/// Quote currencies recognised when splitting concatenated symbols like `BTCUSDT`.
const KNOWN_QUOTES: &[&str] = &[
    "FDUSD", "USDT", "USDC", "TUSD", "BUSD", "DAI", "USD", "EUR", "TRY", "BTC", "ETH", "BNB",
];

/// Symbol could not be parsed into an instrument.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid instrument symbol: {0:?}")]
pub struct InvalidInstrument(pub String);

/// Normalized base/quote trading pair.
///
/// Currency codes are upper-case and shared behind `Arc<str>`, so clones are
/// cheap and an instrument never changes once built. Ordering follows the
/// canonical `BASE/QUOTE` symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instrument {
    base: Arc<str>,
    quote: Arc<str>,
}

impl Instrument {
    /// Build an instrument from currency codes.
    pub fn new(base: &str, quote: &str) -> Result<Self, InvalidInstrument> {
        let base = base.trim().to_ascii_uppercase();
        let quote = quote.trim().to_ascii_uppercase();

        if !is_currency_code(&base) || !is_currency_code(&quote) {
            return Err(InvalidInstrument(format!("{}/{}", base, quote)));
        }

        Ok(Self {
            base: base.into(),
            quote: quote.into(),
        })
    }

    /// Base currency (the asset being bought and sold).
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Quote currency (the asset prices are expressed in).
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Canonical `BASE/QUOTE` symbol.
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

fn is_currency_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric())
}

impl FromStr for Instrument {
    type Err = InvalidInstrument;

    /// Accepts `BTC/USDT`, `BTC_USDT`, `BTC-USDT`, and `BTCUSDT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if let Some((base, quote)) = trimmed.split_once(&['/', '_', '-'][..]) {
            return Instrument::new(base, quote).map_err(|_| InvalidInstrument(s.to_string()));
        }

        let upper = trimmed.to_ascii_uppercase();
        let quote = KNOWN_QUOTES
            .iter()
            .filter(|q| upper.len() > q.len() && upper.ends_with(*q))
            .max_by_key(|q| q.len())
            .ok_or_else(|| InvalidInstrument(s.to_string()))?;

        let base = &upper[..upper.len() - quote.len()];
        Instrument::new(base, quote).map_err(|_| InvalidInstrument(s.to_string()))
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl Serialize for Instrument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Instrument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Best bid/ask and volume for one instrument on one exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Exchange that produced the quote.
    pub exchange: ExchangeId,
    /// Instrument quoted.
    pub instrument: Instrument,
    /// Highest bid price.
    #[serde(with = "rust_decimal::serde::float")]
    pub best_bid: Decimal,
    /// Lowest ask price.
    #[serde(with = "rust_decimal::serde::float")]
    pub best_ask: Decimal,
    /// 24h base-currency volume.
    #[serde(with = "rust_decimal::serde::float")]
    pub volume: Decimal,
    /// When the adapter observed the quote.
    #[serde(with = "time::serde::rfc3339")]
    pub observed_at: OffsetDateTime,
}

impl Quote {
    /// Build a quote observed now.
    pub fn new(
        exchange: ExchangeId,
        instrument: Instrument,
        best_bid: Decimal,
        best_ask: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            exchange,
            instrument,
            best_bid,
            best_ask,
            volume,
            observed_at: OffsetDateTime::now_utc(),
        }
    }

    /// Override the observation time.
    pub fn observed_at(mut self, at: OffsetDateTime) -> Self {
        self.observed_at = at;
        self
    }

    /// Both sides carry a positive price and volume is not negative.
    pub fn is_valid(&self) -> bool {
        self.best_bid > Decimal::ZERO && self.best_ask > Decimal::ZERO && self.volume >= Decimal::ZERO
    }

    /// Older than `ttl` relative to `now`.
    pub fn is_stale(&self, now: OffsetDateTime, ttl: Duration) -> bool {
        now - self.observed_at > ttl
    }
}

/// Withdraw/deposit availability for a currency on one transfer network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    /// Normalized network name (ERC20, TRC20, ...).
    pub network: String,
    /// Withdrawal fee in the currency itself; `None` serializes as `-1`.
    #[serde(serialize_with = "serialize_fee")]
    #[schema(value_type = f64)]
    pub withdraw_fee: Option<Decimal>,
    /// Withdrawals open on this network.
    pub withdraw_enabled: bool,
    /// Deposits open on this network.
    pub deposit_enabled: bool,
}

impl NetworkInfo {
    /// Fee value used on the wire when the fee is unknown.
    pub const UNKNOWN_FEE: f64 = -1.0;
}

fn serialize_fee<S: Serializer>(fee: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error> {
    let value = fee
        .and_then(|f| f.to_f64())
        .unwrap_or(NetworkInfo::UNKNOWN_FEE);
    serializer.serialize_f64(value)
}

/// Network metadata attached to one leg of an opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TradingInfo {
    /// Networks the currency can move over, in adapter order.
    pub networks: Vec<NetworkInfo>,
    /// `false` when the metadata lookup failed or timed out.
    pub available: bool,
}

impl TradingInfo {
    /// Successful lookup.
    pub fn new(networks: Vec<NetworkInfo>) -> Self {
        Self {
            networks,
            available: true,
        }
    }

    /// Explicit "enrichment unavailable" marker.
    pub fn unavailable() -> Self {
        Self {
            networks: Vec::new(),
            available: false,
        }
    }
}
