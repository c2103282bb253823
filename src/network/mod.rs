//! Network enrichment: withdraw/deposit metadata for opportunity legs.

pub mod enricher;

pub use enricher::{EnricherSettings, NetworkEnricher};
