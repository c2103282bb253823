//! Attaches withdraw/deposit network metadata to spread candidates.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::exchange::SharedAdapter;
use crate::market::{ExchangeId, TradingInfo};
use crate::metrics;
use crate::spread::{SpreadCandidate, SpreadOpportunity};

/// Cache and fetch limits for the enricher.
#[derive(Debug, Clone, Copy)]
pub struct EnricherSettings {
    /// How long successful lookups are reused.
    pub success_ttl: Duration,
    /// How long a failed lookup keeps answering "unavailable".
    pub failure_ttl: Duration,
    /// Upper bound for one adapter lookup.
    pub timeout: Duration,
    /// Lookups in flight per request.
    pub concurrency: usize,
}

impl EnricherSettings {
    /// Create from config values.
    pub fn from_config(config: &Config) -> Self {
        Self {
            success_ttl: Duration::from_secs(config.network_info_ttl_secs),
            failure_ttl: Duration::from_secs(config.network_failure_ttl_secs),
            timeout: Duration::from_millis(config.enrich_timeout_ms),
            concurrency: config.enrich_concurrency.max(1),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedEntry {
    info: TradingInfo,
    expires_at: Instant,
}

type CacheKey = (ExchangeId, String);

/// Network metadata lookups with a per-(exchange, currency) TTL cache.
///
/// Concurrent misses on the same key may fetch twice; the last write wins
/// and both results are equivalent.
pub struct NetworkEnricher {
    adapters: HashMap<ExchangeId, SharedAdapter>,
    cache: DashMap<CacheKey, CachedEntry>,
    settings: EnricherSettings,
}

impl NetworkEnricher {
    /// Create an enricher over `adapters`.
    pub fn new(adapters: impl IntoIterator<Item = SharedAdapter>, settings: EnricherSettings) -> Self {
        Self {
            adapters: adapters.into_iter().map(|a| (a.id(), a)).collect(),
            cache: DashMap::new(),
            settings,
        }
    }

    /// Cached entries, expired ones included.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Drop expired cache entries.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.cache.retain(|_, entry| entry.expires_at > now);
    }

    /// Network metadata for `currency` on `exchange`.
    ///
    /// Never fails: errors and timeouts yield [`TradingInfo::unavailable`].
    #[instrument(skip(self), fields(exchange = %exchange))]
    pub async fn trading_info(&self, exchange: ExchangeId, currency: &str) -> TradingInfo {
        let key = (exchange, currency.to_uppercase());

        if let Some(entry) = self.cache.get(&key) {
            if entry.expires_at > Instant::now() {
                metrics::inc_network_cache_hit();
                return entry.info.clone();
            }
        }
        metrics::inc_network_cache_miss();

        let Some(adapter) = self.adapters.get(&exchange) else {
            return TradingInfo::unavailable();
        };

        let fetched = tokio::time::timeout(self.settings.timeout, adapter.fetch_network_info(&key.1)).await;

        let (info, ttl) = match fetched {
            Ok(Ok(networks)) => (TradingInfo::new(networks), self.settings.success_ttl),
            Ok(Err(err)) => {
                metrics::inc_enrichment_failure(exchange);
                warn!(exchange = %exchange, currency = %key.1, error = %err, "Network info lookup failed");
                (TradingInfo::unavailable(), self.settings.failure_ttl)
            }
            Err(_) => {
                metrics::inc_enrichment_failure(exchange);
                warn!(
                    exchange = %exchange,
                    currency = %key.1,
                    timeout_ms = self.settings.timeout.as_millis() as u64,
                    "Network info lookup timed out"
                );
                (TradingInfo::unavailable(), self.settings.failure_ttl)
            }
        };

        self.cache.insert(
            key,
            CachedEntry {
                info: info.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        info
    }

    /// Attach trading info to every candidate, preserving order.
    ///
    /// The withdraw leg is the base currency on the buy exchange, the deposit
    /// leg the base currency on the sell exchange.
    pub async fn enrich(&self, candidates: Vec<SpreadCandidate>) -> Vec<SpreadOpportunity> {
        let keys: BTreeSet<CacheKey> = candidates
            .iter()
            .flat_map(|c| {
                let base = c.instrument.base().to_string();
                [(c.buy_exchange, base.clone()), (c.sell_exchange, base)]
            })
            .collect();

        let lookups = keys.len();
        let resolved: HashMap<CacheKey, TradingInfo> = stream::iter(keys)
            .map(|key| async move {
                let info = self.trading_info(key.0, &key.1).await;
                (key, info)
            })
            .buffer_unordered(self.settings.concurrency)
            .collect()
            .await;

        debug!(candidates = candidates.len(), lookups, "Candidates enriched");

        candidates
            .into_iter()
            .map(|c| {
                let base = c.instrument.base().to_string();
                let buy = resolved
                    .get(&(c.buy_exchange, base.clone()))
                    .cloned()
                    .unwrap_or_else(TradingInfo::unavailable);
                let sell = resolved
                    .get(&(c.sell_exchange, base))
                    .cloned()
                    .unwrap_or_else(TradingInfo::unavailable);
                c.enrich(buy, sell)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use crate::exchange::{MockAdapter, MockConfig};
    use crate::market::NetworkInfo;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn settings() -> EnricherSettings {
        EnricherSettings {
            success_ttl: Duration::from_secs(3600),
            failure_ttl: Duration::from_millis(50),
            timeout: Duration::from_millis(100),
            concurrency: 4,
        }
    }

    fn erc20() -> NetworkInfo {
        NetworkInfo {
            network: "ERC20".into(),
            withdraw_fee: Some(dec!(0.001)),
            withdraw_enabled: true,
            deposit_enabled: true,
        }
    }

    fn candidate(buy: ExchangeId, sell: ExchangeId) -> SpreadCandidate {
        SpreadCandidate {
            instrument: "ETH/USDT".parse().unwrap(),
            buy_exchange: buy,
            buy_price: dec!(100),
            buy_volume: dec!(10),
            sell_exchange: sell,
            sell_price: dec!(101),
            sell_volume: dec!(10),
            spread_percentage: dec!(1),
        }
    }

    #[tokio::test]
    async fn successful_lookup_is_cached() {
        let mock = MockAdapter::new(ExchangeId::Kucoin);
        mock.set_networks("ETH", vec![erc20()]);
        let enricher = NetworkEnricher::new([Arc::new(mock.clone()) as SharedAdapter], settings());

        let first = enricher.trading_info(ExchangeId::Kucoin, "eth").await;
        let second = enricher.trading_info(ExchangeId::Kucoin, "ETH").await;

        assert!(first.available);
        assert_eq!(first, second);
        assert_eq!(mock.network_calls(), 1);
    }

    #[tokio::test]
    async fn failure_is_marked_and_cached_briefly() {
        let mock = MockAdapter::new(ExchangeId::Gateio);
        mock.fail_networks("ETH", AdapterError::Unavailable("503".into()));
        let enricher = NetworkEnricher::new([Arc::new(mock.clone()) as SharedAdapter], settings());

        let info = enricher.trading_info(ExchangeId::Gateio, "ETH").await;
        assert_eq!(info, TradingInfo::unavailable());
        enricher.trading_info(ExchangeId::Gateio, "ETH").await;
        assert_eq!(mock.network_calls(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        enricher.trading_info(ExchangeId::Gateio, "ETH").await;
        assert_eq!(mock.network_calls(), 2);
    }

    #[tokio::test]
    async fn timeout_yields_unavailable_marker() {
        let slow = MockAdapter::with_config(
            ExchangeId::Bybit,
            MockConfig {
                network_latency: Duration::from_millis(500),
                ..Default::default()
            },
        );
        slow.set_networks("ETH", vec![erc20()]);
        let fast = MockAdapter::new(ExchangeId::Kucoin);
        fast.set_networks("ETH", vec![erc20()]);

        let enricher = NetworkEnricher::new(
            [Arc::new(slow) as SharedAdapter, Arc::new(fast) as SharedAdapter],
            settings(),
        );

        let result = enricher
            .enrich(vec![candidate(ExchangeId::Bybit, ExchangeId::Kucoin)])
            .await;

        assert_eq!(result.len(), 1);
        assert!(!result[0].buy_trading_info.available);
        assert!(result[0].buy_trading_info.networks.is_empty());
        assert!(result[0].sell_trading_info.available);
        assert_eq!(result[0].sell_trading_info.networks, vec![erc20()]);
    }

    #[tokio::test]
    async fn enrich_preserves_order_and_dedupes_lookups() {
        let a = MockAdapter::new(ExchangeId::Bybit);
        let b = MockAdapter::new(ExchangeId::Okx);
        let enricher = NetworkEnricher::new(
            [Arc::new(a.clone()) as SharedAdapter, Arc::new(b.clone()) as SharedAdapter],
            settings(),
        );

        let result = enricher
            .enrich(vec![
                candidate(ExchangeId::Bybit, ExchangeId::Okx),
                candidate(ExchangeId::Okx, ExchangeId::Bybit),
            ])
            .await;

        assert_eq!(result[0].buy_exchange, ExchangeId::Bybit);
        assert_eq!(result[1].buy_exchange, ExchangeId::Okx);
        assert_eq!(a.network_calls(), 1);
        assert_eq!(b.network_calls(), 1);
        assert_eq!(enricher.cached_entries(), 2);
    }

    #[tokio::test]
    async fn unknown_exchange_is_unavailable() {
        let enricher = NetworkEnricher::new(Vec::<SharedAdapter>::new(), settings());
        let info = enricher.trading_info(ExchangeId::Mexc, "BTC").await;
        assert!(!info.available);
        assert_eq!(enricher.cached_entries(), 0);
    }
}
