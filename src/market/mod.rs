//! Market module: the data model shared by every other component.
//!
//! This module handles:
//! - Exchange identifiers and normalized instruments
//! - Quotes as produced by exchange adapters
//! - Transfer network metadata and name normalization

pub mod network;
pub mod types;

pub use network::normalize_network;
pub use types::{ExchangeId, Instrument, InvalidInstrument, NetworkInfo, Quote, TradingInfo};
