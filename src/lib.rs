//! Cross-exchange crypto spread scanner.
//!
//! Polls spot tickers from several centralized exchanges, keeps the latest
//! quotes per exchange in a lock-free store, and answers "where can I buy
//! low and sell high right now" queries from a consistent snapshot.
//!
//! # Spread
//!
//! Buy at the ask on one exchange, sell at the bid on another:
//!
//! ```text
//! MEXC  BTC/USDT ask: 100.00
//! BYBIT BTC/USDT bid: 105.00
//! ──────────────────────────
//! spread = (105 - 100) / 100 × 100 = 5.00%
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`market`]: Domain types (exchanges, instruments, quotes, networks)
//! - [`exchange`]: Exchange adapter trait and REST implementations
//! - [`store`]: Per-exchange quote slots and snapshots
//! - [`poller`]: Background poll loops with backoff and health
//! - [`spread`]: Filter validation, spread computation and ranking
//! - [`network`]: Withdraw/deposit network enrichment
//! - [`scanner`]: Query facade and periodic notable-opportunity scan
//! - [`notify`]: Opportunity events and publishers
//! - [`api`]: HTTP API
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod exchange;
pub mod market;
pub mod metrics;
pub mod network;
pub mod notify;
pub mod poller;
pub mod scanner;
pub mod spread;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{Result, ScannerError};
