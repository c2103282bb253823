//! Lock-free quote store with one atomically swapped slot per exchange.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::market::{ExchangeId, Instrument, Quote};
use crate::metrics;

use super::slot::{ExchangeSlot, SlotView, Snapshot};

/// Per-exchange state: the current slot and the degraded flag.
#[derive(Debug)]
struct SlotCell {
    current: ArcSwap<ExchangeSlot>,
    degraded: AtomicBool,
}

impl SlotCell {
    fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ExchangeSlot::default()),
            degraded: AtomicBool::new(false),
        }
    }
}

/// Latest quotes per exchange.
///
/// The set of exchanges is fixed at construction. Writes replace a whole
/// slot; reads never block writers and never observe a half-written batch.
/// Each exchange is expected to have a single writer (its poller).
#[derive(Debug)]
pub struct QuoteStore {
    cells: BTreeMap<ExchangeId, SlotCell>,
}

impl QuoteStore {
    /// Create a store with an empty slot for every exchange in `exchanges`.
    pub fn new(exchanges: impl IntoIterator<Item = ExchangeId>) -> Self {
        let cells = exchanges
            .into_iter()
            .map(|id| (id, SlotCell::new()))
            .collect();
        Self { cells }
    }

    /// Registered exchanges, in id order.
    pub fn exchanges(&self) -> Vec<ExchangeId> {
        self.cells.keys().copied().collect()
    }

    fn cell(&self, exchange: ExchangeId) -> Result<&SlotCell, StoreError> {
        self.cells
            .get(&exchange)
            .ok_or(StoreError::UnknownExchange(exchange))
    }

    /// Replace `exchange`'s slot with `quotes`. Returns the new version.
    ///
    /// Quotes tagged with another exchange are an adapter bug and are dropped.
    pub fn publish(
        &self,
        exchange: ExchangeId,
        quotes: HashMap<Instrument, Quote>,
    ) -> Result<u64, StoreError> {
        let cell = self.cell(exchange)?;

        let quotes: HashMap<Instrument, Quote> = quotes
            .into_iter()
            .filter(|(_, q)| q.exchange == exchange)
            .collect();
        let count = quotes.len();

        let version = cell.current.load().version + 1;
        cell.current.store(Arc::new(ExchangeSlot {
            quotes,
            version,
            refreshed_at: Some(OffsetDateTime::now_utc()),
        }));

        metrics::set_quotes_stored(exchange, count);
        debug!(exchange = %exchange, version, quotes = count, "Slot published");
        Ok(version)
    }

    /// Set `exchange`'s degraded flag. Returns `true` if the flag changed.
    pub fn set_degraded(&self, exchange: ExchangeId, degraded: bool) -> Result<bool, StoreError> {
        let cell = self.cell(exchange)?;
        let previous = cell.degraded.swap(degraded, Ordering::AcqRel);

        if previous != degraded {
            metrics::set_degraded(exchange, degraded);
            info!(exchange = %exchange, degraded, "Degraded flag changed");
        }
        Ok(previous != degraded)
    }

    /// Whether `exchange` is currently degraded.
    pub fn is_degraded(&self, exchange: ExchangeId) -> Result<bool, StoreError> {
        Ok(self.cell(exchange)?.degraded.load(Ordering::Acquire))
    }

    /// Current slot for `exchange`.
    pub fn slot(&self, exchange: ExchangeId) -> Result<Arc<ExchangeSlot>, StoreError> {
        Ok(self.cell(exchange)?.current.load_full())
    }

    /// Capture every slot as of now.
    pub fn snapshot(&self) -> Snapshot {
        let slots = self
            .cells
            .iter()
            .map(|(id, cell)| {
                let view = SlotView {
                    slot: cell.current.load_full(),
                    degraded: cell.degraded.load(Ordering::Acquire),
                };
                (*id, view)
            })
            .collect();

        Snapshot {
            taken_at: OffsetDateTime::now_utc(),
            slots,
        }
    }
}
