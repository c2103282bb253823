//! Prometheus metrics for polling, queries and enrichment.
//!
//! This module provides metrics for:
//! - Per-exchange poll latency and outcomes
//! - Adapter degradation transitions
//! - Spread query latency and result sizes
//! - Network metadata cache behavior
//! - Background scan notifications

use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use tracing::debug;

use crate::market::ExchangeId;

// === Metric Name Constants ===

/// Adapter poll latency metric name.
pub const METRIC_POLL_LATENCY: &str = "poll_latency_ms";
/// Poll outcomes counter metric name.
pub const METRIC_POLLS: &str = "polls_total";
/// Degradation transitions counter metric name.
pub const METRIC_DEGRADED_TRANSITIONS: &str = "adapter_degraded_transitions_total";
/// Degraded flag gauge metric name.
pub const METRIC_ADAPTER_DEGRADED: &str = "adapter_degraded";
/// Quotes held per exchange gauge metric name.
pub const METRIC_QUOTES_STORED: &str = "quotes_stored";
/// Spread query latency metric name.
pub const METRIC_QUERY_LATENCY: &str = "spread_query_latency_ms";
/// Opportunities returned counter metric name.
pub const METRIC_OPPORTUNITIES_RETURNED: &str = "opportunities_returned_total";
/// Rejected queries counter metric name.
pub const METRIC_QUERIES_REJECTED: &str = "queries_rejected_total";
/// Network cache hits counter metric name.
pub const METRIC_NETWORK_CACHE_HITS: &str = "network_cache_hits_total";
/// Network cache misses counter metric name.
pub const METRIC_NETWORK_CACHE_MISSES: &str = "network_cache_misses_total";
/// Enrichment failures counter metric name.
pub const METRIC_ENRICHMENT_FAILURES: &str = "enrichment_failures_total";
/// Background scan latency metric name.
pub const METRIC_SCAN_LATENCY: &str = "scan_latency_ms";
/// Notifications published counter metric name.
pub const METRIC_NOTIFICATIONS_PUBLISHED: &str = "notifications_published_total";
/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    // Latency histograms
    describe_histogram!(METRIC_POLL_LATENCY, "Adapter fetch_quotes latency in milliseconds");
    describe_histogram!(METRIC_QUERY_LATENCY, "Best-spreads query latency in milliseconds");
    describe_histogram!(METRIC_SCAN_LATENCY, "Background scan latency in milliseconds");
    describe_histogram!(METRIC_HTTP_REQUEST_LATENCY, "HTTP request latency in milliseconds");

    // Counters
    describe_counter!(METRIC_POLLS, "Adapter polls by exchange and outcome");
    describe_counter!(
        METRIC_DEGRADED_TRANSITIONS,
        "Times an adapter crossed the consecutive-failure threshold"
    );
    describe_counter!(METRIC_OPPORTUNITIES_RETURNED, "Opportunities returned to callers");
    describe_counter!(METRIC_QUERIES_REJECTED, "Queries rejected with an invalid filter");
    describe_counter!(METRIC_NETWORK_CACHE_HITS, "Network metadata cache hits");
    describe_counter!(METRIC_NETWORK_CACHE_MISSES, "Network metadata cache misses");
    describe_counter!(METRIC_ENRICHMENT_FAILURES, "Network metadata lookups that failed or timed out");
    describe_counter!(METRIC_NOTIFICATIONS_PUBLISHED, "Opportunity events published by the scanner");

    // Gauges
    describe_gauge!(METRIC_ADAPTER_DEGRADED, "1 while an adapter is degraded");
    describe_gauge!(METRIC_QUOTES_STORED, "Quotes held in the latest slot per exchange");

    debug!("Metrics initialized");
}

/// Record a poll's latency and outcome (`success` or an error kind).
pub fn record_poll(exchange: ExchangeId, start: Instant, outcome: &'static str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    let exchange = exchange.to_string();
    histogram!(METRIC_POLL_LATENCY, "exchange" => exchange.clone()).record(latency_ms);
    counter!(METRIC_POLLS, "exchange" => exchange, "outcome" => outcome).increment(1);
}

/// Record the size of a freshly published slot.
pub fn set_quotes_stored(exchange: ExchangeId, count: usize) {
    gauge!(METRIC_QUOTES_STORED, "exchange" => exchange.to_string()).set(count as f64);
}

/// Record a degraded-flag change.
pub fn set_degraded(exchange: ExchangeId, degraded: bool) {
    let exchange = exchange.to_string();
    if degraded {
        counter!(METRIC_DEGRADED_TRANSITIONS, "exchange" => exchange.clone()).increment(1);
    }
    gauge!(METRIC_ADAPTER_DEGRADED, "exchange" => exchange).set(if degraded { 1.0 } else { 0.0 });
}

/// Record HTTP request latency.
pub fn record_http_latency(start: Instant, endpoint: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_HTTP_REQUEST_LATENCY, "endpoint" => endpoint.to_string()).record(latency_ms);
}

/// Add to the opportunities returned counter.
pub fn add_opportunities_returned(count: usize) {
    counter!(METRIC_OPPORTUNITIES_RETURNED).increment(count as u64);
}

/// Increment rejected queries counter.
pub fn inc_queries_rejected() {
    counter!(METRIC_QUERIES_REJECTED).increment(1);
}

/// Increment network cache hit counter.
pub fn inc_network_cache_hit() {
    counter!(METRIC_NETWORK_CACHE_HITS).increment(1);
}

/// Increment network cache miss counter.
pub fn inc_network_cache_miss() {
    counter!(METRIC_NETWORK_CACHE_MISSES).increment(1);
}

/// Increment enrichment failures counter.
pub fn inc_enrichment_failure(exchange: ExchangeId) {
    counter!(METRIC_ENRICHMENT_FAILURES, "exchange" => exchange.to_string()).increment(1);
}

/// Increment notifications published counter.
pub fn inc_notifications_published() {
    counter!(METRIC_NOTIFICATIONS_PUBLISHED).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for a spread query.
pub fn timer_query() -> LatencyTimer {
    LatencyTimer::new(METRIC_QUERY_LATENCY)
}

/// Create a latency timer for a background scan.
pub fn timer_scan() -> LatencyTimer {
    LatencyTimer::new(METRIC_SCAN_LATENCY)
}
