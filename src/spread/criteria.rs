//! Filter criteria: the request DTO and its validated form.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::QueryError;
use crate::market::{ExchangeId, Instrument};

/// Filter criteria as sent by clients.
///
/// Every field is optional. Empty `exchanges`/`pairs` arrays mean "no
/// restriction", like an absent field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    /// Exchanges to consider; `null` or empty = all registered.
    pub exchanges: Option<Vec<String>>,
    /// Instruments to consider; `null` or empty = any quoted on two or more exchanges.
    pub pairs: Option<Vec<String>>,
    /// Lowest spread percentage to return (default 0).
    #[serde(with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub min_profit_percent: Option<Decimal>,
    /// Highest spread percentage to return (default unbounded).
    #[serde(with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub max_profit_percent: Option<Decimal>,
    /// Lowest acceptable `min(buyVolume, sellVolume)` (default 0).
    #[serde(with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub min_volume: Option<Decimal>,
    /// When non-empty, only these instruments are considered.
    pub whitelist: Vec<String>,
    /// Instruments never considered; wins over `whitelist`.
    pub blacklist: Vec<String>,
    /// Keep only the best-ranked opportunity per instrument.
    pub best_per_instrument: bool,
    /// Maximum number of opportunities returned.
    pub limit: Option<usize>,
    /// Also return zero and negative spreads.
    pub include_non_positive: bool,
}

/// Validated filter used by the calculator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpreadFilter {
    /// Allowed exchanges; `None` = all.
    pub exchanges: Option<BTreeSet<ExchangeId>>,
    /// Explicit instrument universe; `None` = derived from the snapshot.
    pub pairs: Option<BTreeSet<Instrument>>,
    /// Inclusive lower spread bound; `None` only with `include_non_positive`.
    pub min_profit: Option<Decimal>,
    /// Inclusive upper spread bound.
    pub max_profit: Option<Decimal>,
    /// Inclusive lower bound on the smaller leg volume.
    pub min_volume: Decimal,
    /// Instrument whitelist.
    pub whitelist: BTreeSet<Instrument>,
    /// Instrument blacklist.
    pub blacklist: BTreeSet<Instrument>,
    /// Keep only the best opportunity per instrument.
    pub best_per_instrument: bool,
    /// Result cap.
    pub limit: Option<usize>,
    /// Keep spreads ≤ 0.
    pub include_non_positive: bool,
}

fn invalid(msg: impl Into<String>) -> QueryError {
    QueryError::InvalidFilter(msg.into())
}

fn parse_instruments(field: &str, raw: &[String]) -> Result<BTreeSet<Instrument>, QueryError> {
    raw.iter()
        .map(|s| {
            s.parse::<Instrument>()
                .map_err(|_| invalid(format!("{}: {:?} is not a valid instrument", field, s)))
        })
        .collect()
}

impl FilterCriteria {
    /// Check every constraint and build the calculator's filter.
    pub fn validate(&self) -> Result<SpreadFilter, QueryError> {
        let exchanges = match self.exchanges.as_deref() {
            None | Some([]) => None,
            Some(raw) => Some(
                raw.iter()
                    .map(|s| {
                        s.parse::<ExchangeId>()
                            .map_err(|_| invalid(format!("exchanges: unknown exchange {:?}", s)))
                    })
                    .collect::<Result<BTreeSet<_>, _>>()?,
            ),
        };

        let pairs = match self.pairs.as_deref() {
            None | Some([]) => None,
            Some(raw) => Some(parse_instruments("pairs", raw)?),
        };

        let whitelist = parse_instruments("whitelist", &self.whitelist)?;
        let blacklist = parse_instruments("blacklist", &self.blacklist)?;

        let min_volume = self.min_volume.unwrap_or(Decimal::ZERO);
        if min_volume < Decimal::ZERO {
            return Err(invalid("minVolume must not be negative"));
        }

        let min_profit = match self.min_profit_percent {
            Some(min) if min < Decimal::ZERO && !self.include_non_positive => {
                return Err(invalid(
                    "minProfitPercent must not be negative unless includeNonPositive is set",
                ))
            }
            Some(min) => Some(min),
            None if self.include_non_positive => None,
            None => Some(Decimal::ZERO),
        };

        if let (Some(min), Some(max)) = (min_profit, self.max_profit_percent) {
            if max < min {
                return Err(invalid(format!(
                    "maxProfitPercent ({}) must be >= minProfitPercent ({})",
                    max, min
                )));
            }
        }

        if self.limit == Some(0) {
            return Err(invalid("limit must be at least 1"));
        }

        Ok(SpreadFilter {
            exchanges,
            pairs,
            min_profit,
            max_profit: self.max_profit_percent,
            min_volume,
            whitelist,
            blacklist,
            best_per_instrument: self.best_per_instrument,
            limit: self.limit,
            include_non_positive: self.include_non_positive,
        })
    }
}

impl SpreadFilter {
    /// Whether quotes from `exchange` take part.
    pub fn allows_exchange(&self, exchange: ExchangeId) -> bool {
        self.exchanges
            .as_ref()
            .map_or(true, |set| set.contains(&exchange))
    }

    /// Whether `instrument` survives pairs, blacklist and whitelist.
    pub fn allows_instrument(&self, instrument: &Instrument) -> bool {
        if self.blacklist.contains(instrument) {
            return false;
        }
        if !self.whitelist.is_empty() && !self.whitelist.contains(instrument) {
            return false;
        }
        self.pairs
            .as_ref()
            .map_or(true, |set| set.contains(instrument))
    }

    /// Whether `spread` (percent) is within bounds.
    pub fn accepts_spread(&self, spread: Decimal) -> bool {
        if !self.include_non_positive && spread <= Decimal::ZERO {
            return false;
        }
        self.min_profit.map_or(true, |min| spread >= min)
            && self.max_profit.map_or(true, |max| spread <= max)
    }
}
