//! Exchange adapters.
//!
//! Each supported exchange sits behind [`ExchangeAdapter`], which yields
//! normalized [`Quote`]s and [`NetworkInfo`]. Adapters know nothing about
//! polling, storage or spread computation.

pub mod auth;
pub mod bybit;
pub mod gateio;
pub mod http;
pub mod kucoin;
pub mod mexc;
pub mod mock;
pub mod okx;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::AdapterError;
use crate::market::{ExchangeId, Instrument, NetworkInfo, Quote};

pub use auth::ApiCredentials;
pub use bybit::BybitAdapter;
pub use gateio::GateioAdapter;
pub use kucoin::KucoinAdapter;
pub use mexc::MexcAdapter;
pub use mock::{MockAdapter, MockConfig, MockFailure};
pub use okx::OkxAdapter;

/// Quotes returned by one adapter call, keyed by instrument.
pub type QuoteBatch = HashMap<Instrument, Quote>;

/// Uniform interface over one exchange's public market data.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Exchange this adapter talks to.
    fn id(&self) -> ExchangeId;

    /// Poll interval used when no override is configured.
    fn default_poll_interval(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// Fetch the current best bid/ask for `instruments`.
    ///
    /// An empty slice means every instrument the exchange lists. Instruments
    /// the exchange does not list are simply absent from the result; quotes
    /// with a non-positive side are dropped.
    async fn fetch_quotes(&self, instruments: &[Instrument]) -> Result<QuoteBatch, AdapterError>;

    /// Fetch transfer networks for `currency`, with names normalized.
    async fn fetch_network_info(&self, currency: &str) -> Result<Vec<NetworkInfo>, AdapterError>;
}

/// Shared handle to an adapter.
pub type SharedAdapter = Arc<dyn ExchangeAdapter>;

/// Build the live adapter for `id` from configuration.
///
/// Bybit, OKX and MEXC only serve network metadata on signed endpoints and
/// pick up their API keys here when configured.
pub fn build_adapter(id: ExchangeId, config: &Config) -> Result<SharedAdapter, AdapterError> {
    let client = http::build_client(config)?;
    let credentials = config.credentials(id);

    let adapter: SharedAdapter = match id {
        ExchangeId::Bybit => Arc::new(BybitAdapter::new(client).with_credentials(credentials)),
        ExchangeId::Kucoin => Arc::new(KucoinAdapter::new(client)),
        ExchangeId::Gateio => Arc::new(GateioAdapter::new(client)),
        ExchangeId::Okx => Arc::new(OkxAdapter::new(client).with_credentials(credentials)),
        ExchangeId::Mexc => Arc::new(MexcAdapter::new(client).with_credentials(credentials)),
    };

    Ok(adapter)
}

/// Keep only quotes that are valid and, when `wanted` is non-empty, requested.
pub(crate) fn retain_requested(
    quotes: impl IntoIterator<Item = Quote>,
    wanted: &[Instrument],
) -> QuoteBatch {
    quotes
        .into_iter()
        .filter(|q| q.is_valid())
        .filter(|q| wanted.is_empty() || wanted.contains(&q.instrument))
        .map(|q| (q.instrument.clone(), q))
        .collect()
}
