//! Scriptable in-memory adapter for tests and local runs.
//!
//! Quotes and network metadata are set directly; failures can be queued one
//! call at a time or made sticky to simulate an exchange outage.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::AdapterError;
use crate::market::{ExchangeId, Instrument, NetworkInfo, Quote};

use super::{retain_requested, ExchangeAdapter, QuoteBatch};

/// Configuration for mock adapter behavior.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Poll interval reported to the poller.
    pub poll_interval: Duration,
    /// Simulated latency of `fetch_quotes`.
    pub quote_latency: Duration,
    /// Simulated latency of `fetch_network_info`.
    pub network_latency: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            quote_latency: Duration::ZERO,
            network_latency: Duration::ZERO,
        }
    }
}

/// Failure injected into the next call(s).
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// Fail exactly the next quote call.
    Once(AdapterError),
    /// Fail every quote call until cleared.
    Always(AdapterError),
}

#[derive(Debug, Default)]
struct MockState {
    quotes: HashMap<Instrument, Quote>,
    networks: HashMap<String, Result<Vec<NetworkInfo>, AdapterError>>,
    queued: VecDeque<AdapterError>,
    sticky: Option<AdapterError>,
}

/// Mock exchange adapter.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    id: ExchangeId,
    config: MockConfig,
    state: Arc<Mutex<MockState>>,
    quote_calls: Arc<AtomicUsize>,
    network_calls: Arc<AtomicUsize>,
}

impl MockAdapter {
    /// Create a mock for `id` with default configuration.
    pub fn new(id: ExchangeId) -> Self {
        Self::with_config(id, MockConfig::default())
    }

    /// Create a mock with custom configuration.
    pub fn with_config(id: ExchangeId, config: MockConfig) -> Self {
        Self {
            id,
            config,
            state: Arc::new(Mutex::new(MockState::default())),
            quote_calls: Arc::new(AtomicUsize::new(0)),
            network_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not wedge the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the quote for `symbol`, observed now.
    ///
    /// # Panics
    ///
    /// Panics if `symbol` is not a valid instrument.
    pub fn set_quote(&self, symbol: &str, bid: Decimal, ask: Decimal, volume: Decimal) {
        let instrument: Instrument = symbol
            .parse()
            .unwrap_or_else(|e| panic!("mock quote for {}: {}", symbol, e));
        self.insert_quote(Quote::new(self.id, instrument, bid, ask, volume));
    }

    /// Insert a fully built quote (e.g. with a custom timestamp).
    pub fn insert_quote(&self, quote: Quote) {
        self.state().quotes.insert(quote.instrument.clone(), quote);
    }

    /// Remove the quote for `instrument`.
    pub fn remove_quote(&self, instrument: &Instrument) {
        self.state().quotes.remove(instrument);
    }

    /// Set network metadata returned for `currency`.
    pub fn set_networks(&self, currency: &str, networks: Vec<NetworkInfo>) {
        self.state()
            .networks
            .insert(currency.to_uppercase(), Ok(networks));
    }

    /// Make network lookups for `currency` fail with `error`.
    pub fn fail_networks(&self, currency: &str, error: AdapterError) {
        self.state()
            .networks
            .insert(currency.to_uppercase(), Err(error));
    }

    /// Inject a quote failure.
    pub fn inject(&self, failure: MockFailure) {
        let mut state = self.state();
        match failure {
            MockFailure::Once(err) => state.queued.push_back(err),
            MockFailure::Always(err) => state.sticky = Some(err),
        }
    }

    /// Drop all injected failures.
    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.queued.clear();
        state.sticky = None;
    }

    /// Number of `fetch_quotes` calls so far.
    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_network_info` calls so far.
    pub fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeAdapter for MockAdapter {
    fn id(&self) -> ExchangeId {
        self.id
    }

    fn default_poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    async fn fetch_quotes(&self, instruments: &[Instrument]) -> Result<QuoteBatch, AdapterError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);

        if !self.config.quote_latency.is_zero() {
            tokio::time::sleep(self.config.quote_latency).await;
        }

        let mut state = self.state();
        if let Some(err) = state.queued.pop_front() {
            return Err(err);
        }
        if let Some(err) = &state.sticky {
            return Err(err.clone());
        }

        Ok(retain_requested(state.quotes.values().cloned(), instruments))
    }

    async fn fetch_network_info(&self, currency: &str) -> Result<Vec<NetworkInfo>, AdapterError> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);

        if !self.config.network_latency.is_zero() {
            tokio::time::sleep(self.config.network_latency).await;
        }

        self.state()
            .networks
            .get(&currency.to_uppercase())
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
