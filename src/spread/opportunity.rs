//! Spread candidates and enriched opportunities.

use std::cmp::Ordering;
use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::market::{ExchangeId, Instrument, TradingInfo};

/// Stable identity of an opportunity: instrument plus direction.
///
/// Downstream consumers key "already notified" state on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpportunityKey {
    /// Instrument traded.
    pub instrument: Instrument,
    /// Exchange bought on.
    pub buy_exchange: ExchangeId,
    /// Exchange sold on.
    pub sell_exchange: ExchangeId,
}

impl OpportunityKey {
    /// Key for buying `instrument` on `buy_exchange` and selling on `sell_exchange`.
    pub fn new(instrument: &Instrument, buy_exchange: ExchangeId, sell_exchange: ExchangeId) -> Self {
        Self {
            instrument: instrument.clone(),
            buy_exchange,
            sell_exchange,
        }
    }
}

impl fmt::Display for OpportunityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}",
            self.instrument, self.buy_exchange, self.sell_exchange
        )
    }
}

/// Buy/sell pair that passed the spread and volume filters, before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadCandidate {
    /// Instrument traded.
    pub instrument: Instrument,
    /// Exchange to buy on (at its ask).
    pub buy_exchange: ExchangeId,
    /// Ask on the buy exchange.
    pub buy_price: Decimal,
    /// Volume on the buy exchange.
    pub buy_volume: Decimal,
    /// Exchange to sell on (at its bid).
    pub sell_exchange: ExchangeId,
    /// Bid on the sell exchange.
    pub sell_price: Decimal,
    /// Volume on the sell exchange.
    pub sell_volume: Decimal,
    /// `(sell_price - buy_price) / buy_price * 100`.
    pub spread_percentage: Decimal,
}

impl SpreadCandidate {
    /// Smaller of the two leg volumes.
    pub fn min_volume(&self) -> Decimal {
        self.buy_volume.min(self.sell_volume)
    }

    /// Deduplicable identity.
    pub fn key(&self) -> OpportunityKey {
        OpportunityKey::new(&self.instrument, self.buy_exchange, self.sell_exchange)
    }

    /// Result ordering: spread desc, min volume desc, instrument asc, then
    /// buy and sell exchange asc so the order is total.
    pub fn rank(&self, other: &Self) -> Ordering {
        other
            .spread_percentage
            .cmp(&self.spread_percentage)
            .then_with(|| other.min_volume().cmp(&self.min_volume()))
            .then_with(|| self.instrument.cmp(&other.instrument))
            .then_with(|| self.buy_exchange.cmp(&other.buy_exchange))
            .then_with(|| self.sell_exchange.cmp(&other.sell_exchange))
    }

    /// Attach network metadata for both legs.
    pub fn enrich(self, buy_trading_info: TradingInfo, sell_trading_info: TradingInfo) -> SpreadOpportunity {
        SpreadOpportunity {
            id: self.key().to_string(),
            instrument: self.instrument,
            buy_exchange: self.buy_exchange,
            buy_price: self.buy_price,
            buy_volume: self.buy_volume,
            sell_exchange: self.sell_exchange,
            sell_price: self.sell_price,
            sell_volume: self.sell_volume,
            spread_percentage: self.spread_percentage,
            buy_trading_info,
            sell_trading_info,
        }
    }
}

/// Opportunity as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpreadOpportunity {
    /// `BASE/QUOTE:BUY->SELL`.
    pub id: String,
    /// Instrument traded.
    #[schema(value_type = String, example = "BTC/USDT")]
    pub instrument: Instrument,
    /// Exchange to buy on.
    pub buy_exchange: ExchangeId,
    /// Ask on the buy exchange.
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub buy_price: Decimal,
    /// Volume on the buy exchange.
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub buy_volume: Decimal,
    /// Exchange to sell on.
    pub sell_exchange: ExchangeId,
    /// Bid on the sell exchange.
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub sell_price: Decimal,
    /// Volume on the sell exchange.
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub sell_volume: Decimal,
    /// Spread in percent.
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub spread_percentage: Decimal,
    /// Withdraw-leg networks on the buy exchange.
    pub buy_trading_info: TradingInfo,
    /// Deposit-leg networks on the sell exchange.
    pub sell_trading_info: TradingInfo,
}

impl SpreadOpportunity {
    /// Deduplicable identity.
    pub fn key(&self) -> OpportunityKey {
        OpportunityKey::new(&self.instrument, self.buy_exchange, self.sell_exchange)
    }
}
