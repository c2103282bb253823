//! Application configuration loaded from environment variables.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::exchange::ApiCredentials;
use crate::market::{ExchangeId, Instrument};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Exchanges ===
    /// Exchanges to register (comma-separated, e.g. `BYBIT,OKX`). Empty = all.
    #[serde(default)]
    pub exchanges: Vec<ExchangeId>,

    /// Instruments to poll (comma-separated). Empty = everything each adapter lists.
    #[serde(default)]
    pub poll_pairs: Vec<String>,

    /// Per-exchange poll intervals in ms, e.g. `BYBIT=2000,OKX=1500`.
    #[serde(default)]
    pub poll_interval_overrides: String,

    /// Upper bound for a single adapter call.
    #[serde(default = "default_adapter_timeout_ms")]
    pub adapter_timeout_ms: u64,

    /// Idle HTTP connections kept per exchange host.
    #[serde(default = "default_http_pool_size")]
    pub http_pool_size: usize,

    // === API keys for signed network-info endpoints ===
    #[serde(default)]
    pub bybit_api_key: Option<String>,

    #[serde(default)]
    pub bybit_api_secret: Option<String>,

    #[serde(default)]
    pub okx_api_key: Option<String>,

    #[serde(default)]
    pub okx_api_secret: Option<String>,

    /// OKX keys are unusable without it.
    #[serde(default)]
    pub okx_api_passphrase: Option<String>,

    #[serde(default)]
    pub mexc_api_key: Option<String>,

    #[serde(default)]
    pub mexc_api_secret: Option<String>,

    // === Poller ===
    /// Quotes older than this are excluded from computation.
    #[serde(default = "default_quote_ttl_secs")]
    pub quote_ttl_secs: u64,

    /// Backoff base after a failed poll.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Consecutive failures before an adapter is marked degraded.
    #[serde(default = "default_degrade_after_failures")]
    pub degrade_after_failures: u32,

    // === Network enrichment ===
    /// TTL of successfully fetched network metadata.
    #[serde(default = "default_network_info_ttl_secs")]
    pub network_info_ttl_secs: u64,

    /// TTL of the "unavailable" marker after a failed metadata fetch.
    #[serde(default = "default_network_failure_ttl_secs")]
    pub network_failure_ttl_secs: u64,

    /// Upper bound for one metadata fetch on the request path.
    #[serde(default = "default_enrich_timeout_ms")]
    pub enrich_timeout_ms: u64,

    /// Metadata fetches in flight per request.
    #[serde(default = "default_enrich_concurrency")]
    pub enrich_concurrency: usize,

    // === Query path ===
    /// Spread queries computed concurrently.
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,

    // === Background scanner ===
    /// Run the periodic scan that publishes notable opportunities.
    #[serde(default = "default_true")]
    pub scanner_enabled: bool,

    /// Seconds between background scans.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Spread (percent) at or above which an opportunity is published.
    #[serde(default = "default_notify_threshold")]
    pub notify_threshold_percent: Decimal,

    /// Upper spread bound for the background scan; higher values are usually bad data.
    #[serde(default = "default_scan_max_profit")]
    pub scan_max_profit_percent: Decimal,

    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_adapter_timeout_ms() -> u64 {
    5_000
}

fn default_http_pool_size() -> usize {
    8
}

fn default_quote_ttl_secs() -> u64 {
    30
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_degrade_after_failures() -> u32 {
    3
}

fn default_network_info_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_network_failure_ttl_secs() -> u64 {
    60
}

fn default_enrich_timeout_ms() -> u64 {
    3_000
}

fn default_enrich_concurrency() -> usize {
    8
}

fn default_max_concurrent_queries() -> usize {
    16
}

fn default_true() -> bool {
    true
}

fn default_scan_interval_secs() -> u64 {
    60
}

fn default_notify_threshold() -> Decimal {
    Decimal::ONE // 1%
}

fn default_scan_max_profit() -> Decimal {
    Decimal::new(20, 0) // 20%
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchanges: Vec::new(),
            poll_pairs: Vec::new(),
            poll_interval_overrides: String::new(),
            adapter_timeout_ms: default_adapter_timeout_ms(),
            http_pool_size: default_http_pool_size(),
            bybit_api_key: None,
            bybit_api_secret: None,
            okx_api_key: None,
            okx_api_secret: None,
            okx_api_passphrase: None,
            mexc_api_key: None,
            mexc_api_secret: None,
            quote_ttl_secs: default_quote_ttl_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            degrade_after_failures: default_degrade_after_failures(),
            network_info_ttl_secs: default_network_info_ttl_secs(),
            network_failure_ttl_secs: default_network_failure_ttl_secs(),
            enrich_timeout_ms: default_enrich_timeout_ms(),
            enrich_concurrency: default_enrich_concurrency(),
            max_concurrent_queries: default_max_concurrent_queries(),
            scanner_enabled: default_true(),
            scan_interval_secs: default_scan_interval_secs(),
            notify_threshold_percent: default_notify_threshold(),
            scan_max_profit_percent: default_scan_max_profit(),
            port: default_port(),
            rust_log: default_log_level(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.adapter_timeout_ms == 0 {
            return Err("ADAPTER_TIMEOUT_MS must be greater than 0".to_string());
        }

        if self.quote_ttl_secs == 0 {
            return Err("QUOTE_TTL_SECS must be greater than 0".to_string());
        }

        if self.backoff_base_ms == 0 || self.backoff_base_ms > self.backoff_max_ms {
            return Err("BACKOFF_BASE_MS must be in 1..=BACKOFF_MAX_MS".to_string());
        }

        if self.degrade_after_failures == 0 {
            return Err("DEGRADE_AFTER_FAILURES must be at least 1".to_string());
        }

        if self.enrich_timeout_ms == 0 || self.enrich_concurrency == 0 {
            return Err("ENRICH_TIMEOUT_MS and ENRICH_CONCURRENCY must be greater than 0".to_string());
        }

        if self.max_concurrent_queries == 0 {
            return Err("MAX_CONCURRENT_QUERIES must be greater than 0".to_string());
        }

        if self.notify_threshold_percent < Decimal::ZERO {
            return Err("NOTIFY_THRESHOLD_PERCENT must not be negative".to_string());
        }

        if self.scan_max_profit_percent < self.notify_threshold_percent {
            return Err("SCAN_MAX_PROFIT_PERCENT must be >= NOTIFY_THRESHOLD_PERCENT".to_string());
        }

        for (exchange, key, secret) in [
            ("BYBIT", &self.bybit_api_key, &self.bybit_api_secret),
            ("OKX", &self.okx_api_key, &self.okx_api_secret),
            ("MEXC", &self.mexc_api_key, &self.mexc_api_secret),
        ] {
            if key.is_some() != secret.is_some() {
                return Err(format!(
                    "{0}_API_KEY and {0}_API_SECRET must be set together",
                    exchange
                ));
            }
        }

        if self.okx_api_key.is_some() && self.okx_api_passphrase.is_none() {
            return Err("OKX_API_PASSPHRASE is required with OKX_API_KEY".to_string());
        }

        self.poll_instruments()?;
        self.interval_overrides()?;

        Ok(())
    }

    /// Exchanges to register, all of them when none are configured.
    pub fn enabled_exchanges(&self) -> Vec<ExchangeId> {
        use strum::IntoEnumIterator;

        if self.exchanges.is_empty() {
            ExchangeId::iter().collect()
        } else {
            let mut ids = self.exchanges.clone();
            ids.sort();
            ids.dedup();
            ids
        }
    }

    /// Parsed `POLL_PAIRS`.
    pub fn poll_instruments(&self) -> Result<Vec<Instrument>, String> {
        self.poll_pairs
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| p.parse::<Instrument>().map_err(|e| format!("POLL_PAIRS: {}", e)))
            .collect()
    }

    /// Parsed `POLL_INTERVAL_OVERRIDES`.
    pub fn interval_overrides(&self) -> Result<HashMap<ExchangeId, Duration>, String> {
        let mut overrides = HashMap::new();

        for entry in self.poll_interval_overrides.split(',').map(str::trim) {
            if entry.is_empty() {
                continue;
            }

            let (name, millis) = entry
                .split_once('=')
                .ok_or_else(|| format!("POLL_INTERVAL_OVERRIDES: expected EXCHANGE=MS, got {:?}", entry))?;

            let exchange: ExchangeId = name
                .trim()
                .parse()
                .map_err(|_| format!("POLL_INTERVAL_OVERRIDES: unknown exchange {:?}", name))?;

            let millis: u64 = millis
                .trim()
                .parse()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| format!("POLL_INTERVAL_OVERRIDES: invalid interval for {}", exchange))?;

            overrides.insert(exchange, Duration::from_millis(millis));
        }

        Ok(overrides)
    }

    /// API credentials for `exchange`, when both key and secret are set.
    pub fn credentials(&self, exchange: ExchangeId) -> Option<ApiCredentials> {
        fn pair(key: &Option<String>, secret: &Option<String>) -> Option<ApiCredentials> {
            let key = key.as_deref().filter(|k| !k.is_empty())?;
            let secret = secret.as_deref().filter(|s| !s.is_empty())?;
            Some(ApiCredentials::new(key, secret))
        }

        match exchange {
            ExchangeId::Bybit => pair(&self.bybit_api_key, &self.bybit_api_secret),
            ExchangeId::Mexc => pair(&self.mexc_api_key, &self.mexc_api_secret),
            ExchangeId::Okx => {
                let creds = pair(&self.okx_api_key, &self.okx_api_secret)?;
                match self.okx_api_passphrase.as_deref() {
                    Some(p) if !p.is_empty() => Some(creds.with_passphrase(p)),
                    _ => Some(creds),
                }
            }
            ExchangeId::Kucoin | ExchangeId::Gateio => None,
        }
    }

    /// Adapter call timeout.
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    /// Quote time-to-live.
    pub fn quote_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_ttl_secs)
    }

    /// Background scan period.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_values_are_sensible() {
        let config = Config::default();
        assert_eq!(config.quote_ttl(), Duration::from_secs(30));
        assert_eq!(config.degrade_after_failures, 3);
        assert_eq!(config.notify_threshold_percent, dec!(1));
        assert_eq!(config.network_info_ttl_secs, 86_400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_exchange_list_enables_all() {
        let config = Config::default();
        assert_eq!(config.enabled_exchanges().len(), 5);

        let config = Config {
            exchanges: vec![ExchangeId::Okx, ExchangeId::Bybit, ExchangeId::Okx],
            ..Config::default()
        };
        assert_eq!(config.enabled_exchanges(), vec![ExchangeId::Bybit, ExchangeId::Okx]);
    }

    #[test]
    fn interval_overrides_are_parsed() {
        let config = Config {
            poll_interval_overrides: "BYBIT=2000, okx=1500,".to_string(),
            ..Config::default()
        };

        let overrides = config.interval_overrides().unwrap();
        assert_eq!(overrides.get(&ExchangeId::Bybit), Some(&Duration::from_millis(2000)));
        assert_eq!(overrides.get(&ExchangeId::Okx), Some(&Duration::from_millis(1500)));
        assert_eq!(overrides.len(), 2);
    }

    #[test]
    fn validate_rejects_bad_overrides() {
        for raw in ["BYBIT", "BINANCE=100", "OKX=0", "OKX=abc"] {
            let config = Config {
                poll_interval_overrides: raw.to_string(),
                ..Config::default()
            };
            assert!(config.validate().is_err(), "{}", raw);
        }
    }

    #[test]
    fn validate_rejects_bad_poll_pairs() {
        let config = Config {
            poll_pairs: vec!["BTC/USDT".to_string(), "???".to_string()],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_backoff() {
        let config = Config {
            backoff_base_ms: 10_000,
            backoff_max_ms: 1_000,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn credentials_are_read_per_exchange() {
        let vars = vec![
            ("BYBIT_API_KEY".to_string(), "bk".to_string()),
            ("BYBIT_API_SECRET".to_string(), "bs".to_string()),
            ("OKX_API_KEY".to_string(), "ok".to_string()),
            ("OKX_API_SECRET".to_string(), "os".to_string()),
            ("OKX_API_PASSPHRASE".to_string(), "op".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.credentials(ExchangeId::Bybit), Some(ApiCredentials::new("bk", "bs")));
        assert_eq!(
            config.credentials(ExchangeId::Okx),
            Some(ApiCredentials::new("ok", "os").with_passphrase("op"))
        );
        assert_eq!(config.credentials(ExchangeId::Mexc), None);
        assert_eq!(config.credentials(ExchangeId::Kucoin), None);
    }

    #[test]
    fn validate_rejects_half_configured_keys() {
        let config = Config {
            mexc_api_key: Some("key".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            okx_api_key: Some("key".to_string()),
            okx_api_secret: Some("secret".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_env_pairs() {
        let vars = vec![
            ("EXCHANGES".to_string(), "BYBIT,KUCOIN".to_string()),
            ("QUOTE_TTL_SECS".to_string(), "45".to_string()),
            ("NOTIFY_THRESHOLD_PERCENT".to_string(), "2.5".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(config.exchanges, vec![ExchangeId::Bybit, ExchangeId::Kucoin]);
        assert_eq!(config.quote_ttl_secs, 45);
        assert_eq!(config.notify_threshold_percent, dec!(2.5));
        assert_eq!(config.port, 8080);
    }
}
