//! Poller module: one independent task per exchange adapter.
//!
//! Each task calls its adapter on a fixed interval, publishes successful
//! batches to the [`QuoteStore`], backs off exponentially on failure and
//! flags the exchange as degraded after too many consecutive failures. A
//! slow or failing exchange never delays the others.

pub mod backoff;
pub mod health;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{AdapterError, Result, StoreError};
use crate::exchange::SharedAdapter;
use crate::market::{ExchangeId, Instrument};
use crate::metrics;
use crate::store::QuoteStore;
use crate::utils::stopped;

pub use backoff::Backoff;
pub use health::{AdapterHealth, HealthRegistry, PollPhase};

/// Settings for one poller.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Regular interval between polls.
    pub interval: Duration,
    /// Upper bound for one adapter call.
    pub timeout: Duration,
    /// Backoff applied after failures.
    pub backoff: Backoff,
    /// Consecutive failures before the exchange is degraded.
    pub degrade_after: u32,
    /// Instruments to request; empty means all.
    pub instruments: Arc<[Instrument]>,
}

impl PollerSettings {
    /// Settings for `adapter` from config, honouring interval overrides.
    pub fn from_config(
        config: &Config,
        adapter: &SharedAdapter,
        overrides: &HashMap<ExchangeId, Duration>,
        instruments: Arc<[Instrument]>,
    ) -> Self {
        let interval = overrides
            .get(&adapter.id())
            .copied()
            .unwrap_or_else(|| adapter.default_poll_interval());

        Self {
            interval,
            timeout: config.adapter_timeout(),
            backoff: Backoff::from_config(config),
            degrade_after: config.degrade_after_failures,
            instruments,
        }
    }
}

/// Result of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Batch published to the store.
    Published {
        /// New slot version.
        version: u64,
        /// Quotes in the batch.
        quotes: usize,
    },
    /// Adapter call failed; the previous slot is untouched.
    Failed(AdapterError),
}

/// Poll loop state for one adapter.
pub struct Poller {
    adapter: SharedAdapter,
    store: Arc<QuoteStore>,
    health: HealthRegistry,
    settings: PollerSettings,
    failures: u32,
    last_error: Option<AdapterError>,
}

impl Poller {
    /// Create a poller and register it in `health`.
    pub fn new(
        adapter: SharedAdapter,
        store: Arc<QuoteStore>,
        health: HealthRegistry,
        settings: PollerSettings,
    ) -> Self {
        health.register(adapter.id(), settings.interval.as_millis() as u64);
        Self {
            adapter,
            store,
            health,
            settings,
            failures: 0,
            last_error: None,
        }
    }

    /// Exchange polled.
    pub fn exchange(&self) -> ExchangeId {
        self.adapter.id()
    }

    /// Consecutive failures so far.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Perform one poll and apply its result to the store.
    ///
    /// Adapter failures are reported as [`PollOutcome::Failed`]; only a store
    /// invariant violation is an error.
    #[instrument(skip(self), fields(exchange = %self.adapter.id()))]
    pub async fn poll_once(&mut self) -> std::result::Result<PollOutcome, StoreError> {
        let exchange = self.adapter.id();
        self.health.update(exchange, |h| {
            h.phase = PollPhase::Fetching;
            h.total_polls += 1;
        });

        let start = Instant::now();
        let result = tokio::time::timeout(
            self.settings.timeout,
            self.adapter.fetch_quotes(&self.settings.instruments),
        )
        .await
        .unwrap_or_else(|_| Err(AdapterError::timed_out(self.settings.timeout)));

        match result {
            Ok(batch) => {
                metrics::record_poll(exchange, start, "success");
                let quotes = batch.len();
                let version = self.store.publish(exchange, batch)?;

                if self.failures > 0 {
                    info!(exchange = %exchange, after = self.failures, "Adapter recovered");
                }
                self.failures = 0;
                self.last_error = None;
                self.store.set_degraded(exchange, false)?;

                self.health.update(exchange, |h| {
                    h.phase = PollPhase::Success;
                    h.consecutive_failures = 0;
                    h.degraded = false;
                    h.last_success = Some(OffsetDateTime::now_utc());
                    h.last_error = None;
                    h.quote_count = quotes;
                });

                debug!(exchange = %exchange, version, quotes, "Poll succeeded");
                Ok(PollOutcome::Published { version, quotes })
            }
            Err(err) => {
                metrics::record_poll(exchange, start, err.kind());
                self.failures = self.failures.saturating_add(1);

                let degraded = self.failures >= self.settings.degrade_after;
                if degraded && self.store.set_degraded(exchange, true)? {
                    warn!(exchange = %exchange, failures = self.failures, "Adapter degraded");
                }

                warn!(exchange = %exchange, failures = self.failures, error = %err, "Poll failed");

                let failures = self.failures;
                let message = err.to_string();
                self.health.update(exchange, |h| {
                    h.phase = PollPhase::Failed;
                    h.consecutive_failures = failures;
                    h.degraded = degraded;
                    h.last_error = Some(message);
                });

                self.last_error = Some(err.clone());
                Ok(PollOutcome::Failed(err))
            }
        }
    }

    /// Wait before the next poll given the failure streak.
    pub fn next_wait(&self) -> Duration {
        self.settings
            .backoff
            .next_wait(self.settings.interval, self.failures, self.last_error.as_ref())
    }

    /// Poll until `shutdown` flips to `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<ExchangeId> {
        let exchange = self.exchange();
        info!(exchange = %exchange, interval_ms = self.settings.interval.as_millis() as u64, "Poller started");

        loop {
            tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                outcome = self.poll_once() => { outcome?; }
            }

            let wait = self.next_wait();
            debug!(exchange = %exchange, delay_ms = wait.as_millis() as u64, failures = self.failures, "Next poll scheduled");
            self.health.update(exchange, |h| {
                if h.phase == PollPhase::Success {
                    h.phase = PollPhase::Idle;
                }
            });

            tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.health.update(exchange, |h| h.phase = PollPhase::Stopped);
        info!(exchange = %exchange, "Poller stopped");
        Ok(exchange)
    }
}

/// Handle to the spawned poll tasks.
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    tasks: JoinSet<Result<ExchangeId>>,
}

impl PollerHandle {
    /// Spawn one task per poller.
    pub fn spawn(pollers: Vec<Poller>) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        for poller in pollers {
            tasks.spawn(poller.run(rx.clone()));
        }

        Self { shutdown, tasks }
    }

    /// Receiver that flips to `true` when [`PollerHandle::shutdown`] is called.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Number of running tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// No tasks running.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next task to exit. `None` when all tasks have exited.
    ///
    /// Tasks only exit early on a store invariant violation, which the
    /// caller should treat as fatal.
    pub async fn join_next(&mut self) -> Option<Result<ExchangeId>> {
        let joined = self.tasks.join_next().await?;
        Some(joined.map_err(Into::into).and_then(|r| r))
    }

    /// Signal every task to stop and wait for them.
    pub async fn shutdown(mut self) -> Result<()> {
        // Receivers may already be gone if every task failed.
        let _ = self.shutdown.send(true);

        let mut first_error = None;
        while let Some(result) = self.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Poller exited with error");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
