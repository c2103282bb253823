//! Shared wiring: mock adapters, store, pollers and facade.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use spread_scanner::exchange::{MockAdapter, MockConfig, SharedAdapter};
use spread_scanner::market::ExchangeId;
use spread_scanner::network::{EnricherSettings, NetworkEnricher};
use spread_scanner::poller::{Backoff, HealthRegistry, Poller, PollerSettings};
use spread_scanner::scanner::QueryFacade;
use spread_scanner::spread::SpreadCalculator;
use spread_scanner::store::QuoteStore;

/// One mock per exchange plus the engine components around them.
#[allow(dead_code)]
pub struct Harness {
    pub mocks: HashMap<ExchangeId, MockAdapter>,
    pub store: Arc<QuoteStore>,
    pub health: HealthRegistry,
    pub facade: Arc<QueryFacade>,
    pollers: HashMap<ExchangeId, Poller>,
}

pub fn poller_settings() -> PollerSettings {
    PollerSettings {
        interval: Duration::from_millis(10),
        timeout: Duration::from_millis(200),
        backoff: Backoff {
            initial_delay_ms: 5,
            max_delay_ms: 20,
            multiplier: 2.0,
        },
        degrade_after: 3,
        instruments: Arc::from(Vec::new()),
    }
}

impl Harness {
    pub fn new(ids: &[ExchangeId]) -> Self {
        Self::with_network_latency(ids, HashMap::new())
    }

    /// Like [`Harness::new`], with slow network lookups on some exchanges.
    pub fn with_network_latency(ids: &[ExchangeId], latency: HashMap<ExchangeId, Duration>) -> Self {
        let mocks: HashMap<ExchangeId, MockAdapter> = ids
            .iter()
            .map(|&id| {
                let config = MockConfig {
                    network_latency: latency.get(&id).copied().unwrap_or_default(),
                    ..Default::default()
                };
                (id, MockAdapter::with_config(id, config))
            })
            .collect();

        let adapters: Vec<SharedAdapter> = mocks
            .values()
            .map(|m| Arc::new(m.clone()) as SharedAdapter)
            .collect();

        let store = Arc::new(QuoteStore::new(ids.iter().copied()));
        let health = HealthRegistry::new();

        let pollers = adapters
            .iter()
            .map(|a| {
                (
                    a.id(),
                    Poller::new(a.clone(), store.clone(), health.clone(), poller_settings()),
                )
            })
            .collect();

        let enricher = Arc::new(NetworkEnricher::new(
            adapters,
            EnricherSettings {
                success_ttl: Duration::from_secs(60),
                failure_ttl: Duration::from_secs(1),
                timeout: Duration::from_millis(100),
                concurrency: 4,
            },
        ));

        let facade = Arc::new(QueryFacade::new(
            store.clone(),
            SpreadCalculator::new(Duration::from_secs(30)),
            enricher,
            health.clone(),
            4,
        ));

        Self {
            mocks,
            store,
            health,
            facade,
            pollers,
        }
    }

    pub fn mock(&self, id: ExchangeId) -> &MockAdapter {
        &self.mocks[&id]
    }

    /// Poll `id` once.
    pub async fn poll(&mut self, id: ExchangeId) {
        let poller = self.pollers.get_mut(&id).expect("registered exchange");
        poller.poll_once().await.expect("store accepts registered exchange");
    }

    /// Poll every exchange once.
    pub async fn poll_all(&mut self) {
        let ids: Vec<ExchangeId> = self.pollers.keys().copied().collect();
        for id in ids {
            self.poll(id).await;
        }
    }
}
