//! Outbound opportunity events.
//!
//! The scanner hands notable opportunities to an [`OpportunityPublisher`].
//! Each event carries a stable [`OpportunityKey`] so a downstream consumer can
//! suppress repeat alerts; this crate keeps no "already notified" state.

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::info;
use utoipa::ToSchema;

use crate::metrics;
use crate::spread::SpreadOpportunity;

pub use crate::spread::OpportunityKey;

/// Notable opportunity detected by a background scan.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityEvent {
    /// Deduplication key, `BASE/QUOTE:BUY->SELL`.
    pub id: String,
    /// The opportunity as computed.
    pub opportunity: SpreadOpportunity,
    /// When the scan found it.
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String)]
    pub detected_at: OffsetDateTime,
}

impl OpportunityEvent {
    /// Wrap `opportunity` with the current time.
    pub fn new(opportunity: SpreadOpportunity) -> Self {
        Self {
            id: opportunity.key().to_string(),
            opportunity,
            detected_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Error from a publisher.
#[derive(Debug, thiserror::Error)]
#[error("publish failed: {0}")]
pub struct PublishError(pub String);

/// Sink for opportunity events.
#[async_trait]
pub trait OpportunityPublisher: Send + Sync {
    /// Publish one event.
    async fn publish(&self, event: OpportunityEvent) -> Result<(), PublishError>;
}

/// Publishes events as structured log lines.
#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

#[async_trait]
impl OpportunityPublisher for LogPublisher {
    async fn publish(&self, event: OpportunityEvent) -> Result<(), PublishError> {
        let opp = &event.opportunity;
        info!(
            id = %event.id,
            instrument = %opp.instrument,
            buy = %opp.buy_exchange,
            sell = %opp.sell_exchange,
            spread_pct = %opp.spread_percentage.round_dp(4),
            "Notable opportunity"
        );
        metrics::inc_notifications_published();
        Ok(())
    }
}

/// Forwards events into an mpsc channel, e.g. towards a message-queue bridge.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<OpportunityEvent>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<OpportunityEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl OpportunityPublisher for ChannelPublisher {
    async fn publish(&self, event: OpportunityEvent) -> Result<(), PublishError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| PublishError("receiver dropped".to_string()))?;
        metrics::inc_notifications_published();
        Ok(())
    }
}
