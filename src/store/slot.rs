//! Immutable per-exchange slots and point-in-time snapshots.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::market::{ExchangeId, Instrument, Quote};

/// Latest quote batch from one exchange.
///
/// Never mutated after publication; the store swaps whole slots.
#[derive(Debug, Clone, Default)]
pub struct ExchangeSlot {
    /// Quotes from the last successful poll.
    pub quotes: HashMap<Instrument, Quote>,
    /// Incremented on every publication, starting at 1.
    pub version: u64,
    /// When the batch was published. `None` until the first poll lands.
    pub refreshed_at: Option<OffsetDateTime>,
}

impl ExchangeSlot {
    /// Whether this slot has ever been filled.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// One exchange's slot as captured by a snapshot.
#[derive(Debug, Clone)]
pub struct SlotView {
    /// The slot that was current when the snapshot was taken.
    pub slot: Arc<ExchangeSlot>,
    /// Degraded flag at snapshot time.
    pub degraded: bool,
}

/// Consistent view over every exchange slot.
///
/// Each slot is read exactly once when the snapshot is built, so a reader
/// sees either the whole previous batch or the whole next one for every
/// exchange, never a mix.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// When the snapshot was taken; staleness is judged against this.
    pub taken_at: OffsetDateTime,
    /// Slot per registered exchange.
    pub slots: BTreeMap<ExchangeId, SlotView>,
}

impl Snapshot {
    /// Registered exchanges, in id order.
    pub fn exchanges(&self) -> impl Iterator<Item = ExchangeId> + '_ {
        self.slots.keys().copied()
    }

    /// At least one exchange has published quotes.
    pub fn has_quotes(&self) -> bool {
        self.slots.values().any(|v| !v.slot.is_empty())
    }

    /// Sorted union of instruments across all slots.
    pub fn instruments(&self) -> BTreeSet<Instrument> {
        self.slots
            .values()
            .flat_map(|v| v.slot.quotes.keys().cloned())
            .collect()
    }

    /// Quotes usable for computation: from non-degraded exchanges accepted by
    /// `include`, valid, and no older than `ttl`.
    pub fn live_quotes(&self, ttl: Duration, include: impl Fn(ExchangeId) -> bool) -> Vec<&Quote> {
        let now = self.taken_at;
        self.slots
            .iter()
            .filter(|(id, view)| !view.degraded && include(**id))
            .flat_map(|(_, view)| view.slot.quotes.values())
            .filter(|q| q.is_valid() && !q.is_stale(now, ttl))
            .collect()
    }
}
