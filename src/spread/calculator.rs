//! Pairwise spread computation over a snapshot.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use rust_decimal::Decimal;
use smallvec::SmallVec;
use tracing::{debug, instrument};

use crate::market::{Instrument, Quote};
use crate::store::Snapshot;

use super::criteria::SpreadFilter;
use super::opportunity::SpreadCandidate;

/// Quotes for one instrument, one per exchange. Rarely more than a dozen.
type QuoteSet<'a> = SmallVec<[&'a Quote; 12]>;

/// Spread percentage for buying at `buy_ask` and selling at `sell_bid`.
///
/// `None` when `buy_ask` is zero or the result does not fit in a `Decimal`.
pub fn spread_percentage(buy_ask: Decimal, sell_bid: Decimal) -> Option<Decimal> {
    sell_bid
        .checked_sub(buy_ask)?
        .checked_div(buy_ask)?
        .checked_mul(Decimal::ONE_HUNDRED)
}

/// Computes ranked spread candidates from a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SpreadCalculator {
    quote_ttl: Duration,
}

impl SpreadCalculator {
    /// Create a calculator that ignores quotes older than `quote_ttl`.
    pub fn new(quote_ttl: Duration) -> Self {
        Self { quote_ttl }
    }

    /// Live quotes grouped by instrument, restricted by exchange and pairs.
    fn group<'a>(&self, snapshot: &'a Snapshot, filter: &SpreadFilter) -> BTreeMap<&'a Instrument, QuoteSet<'a>> {
        let mut groups: BTreeMap<&Instrument, QuoteSet<'_>> = BTreeMap::new();

        for quote in snapshot.live_quotes(self.quote_ttl, |id| filter.allows_exchange(id)) {
            if filter
                .pairs
                .as_ref()
                .is_some_and(|pairs| !pairs.contains(&quote.instrument))
            {
                continue;
            }
            groups.entry(&quote.instrument).or_default().push(quote);
        }

        groups
    }

    /// Every buy/sell combination that passes `filter`, ranked.
    #[instrument(skip_all, fields(exchanges = snapshot.slots.len()))]
    pub fn calculate(&self, snapshot: &Snapshot, filter: &SpreadFilter) -> Vec<SpreadCandidate> {
        let groups = self.group(snapshot, filter);

        let mut candidates = Vec::new();
        let mut universe = 0usize;

        for (instrument, quotes) in groups {
            // Fewer than two live exchanges: nothing to compare.
            if quotes.len() < 2 || !filter.allows_instrument(instrument) {
                continue;
            }
            universe += 1;

            for buy in &quotes {
                for sell in &quotes {
                    if buy.exchange == sell.exchange {
                        continue;
                    }

                    let Some(spread) = spread_percentage(buy.best_ask, sell.best_bid) else {
                        debug!(
                            instrument = %instrument,
                            buy = %buy.exchange,
                            sell = %sell.exchange,
                            ask = %buy.best_ask,
                            bid = %sell.best_bid,
                            "Spread out of range, skipped"
                        );
                        continue;
                    };
                    if !filter.accepts_spread(spread) {
                        continue;
                    }
                    if buy.volume.min(sell.volume) < filter.min_volume {
                        continue;
                    }

                    candidates.push(SpreadCandidate {
                        instrument: instrument.clone(),
                        buy_exchange: buy.exchange,
                        buy_price: buy.best_ask,
                        buy_volume: buy.volume,
                        sell_exchange: sell.exchange,
                        sell_price: sell.best_bid,
                        sell_volume: sell.volume,
                        spread_percentage: spread,
                    });
                }
            }
        }

        candidates.sort_by(SpreadCandidate::rank);

        if filter.best_per_instrument {
            let mut seen = HashSet::new();
            candidates.retain(|c| seen.insert(c.instrument.clone()));
        }

        if let Some(limit) = filter.limit {
            candidates.truncate(limit);
        }

        debug!(universe, candidates = candidates.len(), "Spreads calculated");
        candidates
    }
}
