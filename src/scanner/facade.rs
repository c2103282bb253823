//! Read path: filter validation, snapshot, calculation and enrichment.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

use crate::error::QueryError;
use crate::market::ExchangeId;
use crate::metrics;
use crate::network::NetworkEnricher;
use crate::poller::{AdapterHealth, HealthRegistry};
use crate::spread::{FilterCriteria, SpreadCalculator, SpreadOpportunity};
use crate::store::QuoteStore;

/// Entry point for every spread query.
///
/// Queries never touch an adapter's quote path: they read one snapshot from
/// the store. At most `max_concurrent` queries compute at a time; the rest
/// wait for a permit.
pub struct QueryFacade {
    store: Arc<QuoteStore>,
    calculator: SpreadCalculator,
    enricher: Arc<NetworkEnricher>,
    health: HealthRegistry,
    permits: Semaphore,
}

impl QueryFacade {
    /// Create a facade over shared components.
    pub fn new(
        store: Arc<QuoteStore>,
        calculator: SpreadCalculator,
        enricher: Arc<NetworkEnricher>,
        health: HealthRegistry,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            calculator,
            enricher,
            health,
            permits: Semaphore::new(max_concurrent.max(1)),
        }
    }

    /// Ranked, enriched opportunities matching `criteria`.
    ///
    /// An empty vector is a valid answer; only an invalid filter is an error.
    #[instrument(skip_all)]
    pub async fn best_spreads(&self, criteria: &FilterCriteria) -> Result<Vec<SpreadOpportunity>, QueryError> {
        let filter = criteria.validate().inspect_err(|e| {
            metrics::inc_queries_rejected();
            info!(reason = %e, "Filter rejected");
        })?;

        // The semaphore is never closed, so acquire only fails after drop.
        let _permit = self.permits.acquire().await.ok();
        let _timer = metrics::timer_query();

        let snapshot = self.store.snapshot();
        let candidates = self.calculator.calculate(&snapshot, &filter);
        let opportunities = self.enricher.enrich(candidates).await;

        metrics::add_opportunities_returned(opportunities.len());
        debug!(count = opportunities.len(), "Query answered");
        Ok(opportunities)
    }

    /// Registered exchanges, healthy or not.
    pub fn available_exchanges(&self) -> Vec<ExchangeId> {
        self.store.exchanges()
    }

    /// Sorted symbols of every instrument currently held by any exchange.
    pub fn available_pairs(&self) -> Vec<String> {
        self.store
            .snapshot()
            .instruments()
            .into_iter()
            .map(|i| i.symbol())
            .collect()
    }

    /// Poll health per exchange.
    pub fn exchange_status(&self) -> Vec<AdapterHealth> {
        self.health.all()
    }

    /// Whether at least one exchange has published quotes.
    pub fn is_ready(&self) -> bool {
        self.store.snapshot().has_quotes()
    }

    /// The enricher, for cache maintenance.
    pub fn enricher(&self) -> &Arc<NetworkEnricher> {
        &self.enricher
    }
}
