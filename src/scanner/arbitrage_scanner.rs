//! Periodic scan that publishes notable opportunities.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::config::Config;
use crate::error::QueryError;
use crate::metrics;
use crate::notify::{OpportunityEvent, OpportunityPublisher};
use crate::spread::FilterCriteria;
use crate::utils::{format_percent, stopped};

use super::facade::QueryFacade;

/// Runtime-editable scan settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    /// Scans are skipped while false.
    pub enabled: bool,
    /// Opportunities at or above this spread are published.
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub notify_threshold_percent: Decimal,
    /// Filter used for every scan.
    #[serde(default)]
    pub criteria: FilterCriteria,
}

impl ScanConfig {
    /// Scanner defaults from config: threshold as the lower bound, the
    /// configured cap as the upper one.
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.scanner_enabled,
            notify_threshold_percent: config.notify_threshold_percent,
            criteria: FilterCriteria {
                min_profit_percent: Some(config.notify_threshold_percent),
                max_profit_percent: Some(config.scan_max_profit_percent),
                ..Default::default()
            },
        }
    }

    /// Reject settings a scan could not run with.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.notify_threshold_percent < Decimal::ZERO {
            return Err(QueryError::InvalidFilter(
                "notifyThresholdPercent must not be negative".to_string(),
            ));
        }
        self.criteria.validate().map(|_| ())
    }
}

/// Background task running [`QueryFacade::best_spreads`] on a fixed interval.
pub struct ArbitrageScanner {
    facade: Arc<QueryFacade>,
    publisher: Arc<dyn OpportunityPublisher>,
    config: Arc<RwLock<ScanConfig>>,
    interval: Duration,
}

impl ArbitrageScanner {
    /// Create a scanner.
    pub fn new(
        facade: Arc<QueryFacade>,
        publisher: Arc<dyn OpportunityPublisher>,
        config: ScanConfig,
        interval: Duration,
    ) -> Self {
        Self {
            facade,
            publisher,
            config: Arc::new(RwLock::new(config)),
            interval,
        }
    }

    /// Shared handle to the scan settings, for the HTTP layer.
    pub fn config_handle(&self) -> Arc<RwLock<ScanConfig>> {
        self.config.clone()
    }

    /// Run one scan and publish every notable opportunity.
    ///
    /// Returns the number of events published. Publisher failures are
    /// logged and skipped.
    #[instrument(skip(self))]
    pub async fn scan_once(&self) -> Result<usize, QueryError> {
        let config = self.config.read().await.clone();
        if !config.enabled {
            debug!("Scanner disabled, skipping");
            return Ok(0);
        }

        let _timer = metrics::timer_scan();
        let opportunities = self.facade.best_spreads(&config.criteria).await?;

        let mut published = 0;
        for opportunity in opportunities
            .into_iter()
            .filter(|o| o.spread_percentage >= config.notify_threshold_percent)
        {
            let event = OpportunityEvent::new(opportunity);
            let id = event.id.clone();
            match self.publisher.publish(event).await {
                Ok(()) => published += 1,
                Err(e) => warn!(id = %id, error = %e, "Failed to publish opportunity"),
            }
        }

        if published > 0 {
            info!(
                published,
                threshold = %format_percent(config.notify_threshold_percent),
                "Scan complete"
            );
        }
        Ok(published)
    }

    /// Scan every interval until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Scanner started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }

            // Stale caches are dropped here, between requests.
            self.facade.enricher().purge_expired();

            if let Err(e) = self.scan_once().await {
                warn!(error = %e, "Scan rejected its criteria");
            }
        }

        info!("Scanner stopped");
    }
}
