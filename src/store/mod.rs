//! Quote store module.
//!
//! This module handles:
//! - One atomically replaced slot of quotes per exchange
//! - Degraded flags set by the poller
//! - Consistent snapshots for spread computation

pub mod quote_store;
pub mod slot;

pub use quote_store::QuoteStore;
pub use slot::{ExchangeSlot, SlotView, Snapshot};
