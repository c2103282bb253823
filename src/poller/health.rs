//! Per-adapter poll health, shared with the API.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use strum::Display;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::market::ExchangeId;

/// Where an adapter's poll loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PollPhase {
    /// Waiting for the next tick.
    Idle,
    /// A `fetch_quotes` call is in flight.
    Fetching,
    /// Last call succeeded.
    Success,
    /// Last call failed.
    Failed,
    /// Loop has exited.
    Stopped,
}

/// Health of one adapter.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdapterHealth {
    /// Exchange polled.
    pub exchange: ExchangeId,
    /// Current loop phase.
    pub phase: PollPhase,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Excluded from computation.
    pub degraded: bool,
    /// Time of the last successful poll.
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>)]
    pub last_success: Option<OffsetDateTime>,
    /// Message of the last failure.
    pub last_error: Option<String>,
    /// Quotes in the last published batch.
    pub quote_count: usize,
    /// Poll attempts since start.
    pub total_polls: u64,
    /// Regular poll interval in milliseconds.
    pub interval_ms: u64,
}

impl AdapterHealth {
    fn new(exchange: ExchangeId, interval_ms: u64) -> Self {
        Self {
            exchange,
            phase: PollPhase::Idle,
            consecutive_failures: 0,
            degraded: false,
            last_success: None,
            last_error: None,
            quote_count: 0,
            total_polls: 0,
            interval_ms,
        }
    }
}

/// Shared map of adapter health, written by pollers and read by the API.
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    entries: Arc<DashMap<ExchangeId, AdapterHealth>>,
}

impl HealthRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `exchange` in the idle phase.
    pub fn register(&self, exchange: ExchangeId, interval_ms: u64) {
        self.entries
            .insert(exchange, AdapterHealth::new(exchange, interval_ms));
    }

    /// Apply `f` to `exchange`'s entry if registered.
    pub fn update(&self, exchange: ExchangeId, f: impl FnOnce(&mut AdapterHealth)) {
        if let Some(mut entry) = self.entries.get_mut(&exchange) {
            f(entry.value_mut());
        }
    }

    /// Health of `exchange`.
    pub fn get(&self, exchange: ExchangeId) -> Option<AdapterHealth> {
        self.entries.get(&exchange).map(|e| e.value().clone())
    }

    /// All entries, sorted by exchange.
    pub fn all(&self) -> Vec<AdapterHealth> {
        let mut all: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|h| h.exchange);
        all
    }
}
