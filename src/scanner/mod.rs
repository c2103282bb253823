//! Query facade and background arbitrage scanner.

pub mod arbitrage_scanner;
pub mod facade;

pub use arbitrage_scanner::{ArbitrageScanner, ScanConfig};
pub use facade::QueryFacade;
