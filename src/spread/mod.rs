//! Spread module: filtering, pairwise computation and ranking.
//!
//! This module handles:
//! - Validation of client filter criteria
//! - Instrument universe selection (pairs, whitelist, blacklist)
//! - Buy-at-ask / sell-at-bid spread computation in decimal arithmetic
//! - Deterministic ranking of the results

pub mod calculator;
pub mod criteria;
pub mod opportunity;

pub use calculator::{spread_percentage, SpreadCalculator};
pub use criteria::{FilterCriteria, SpreadFilter};
pub use opportunity::{OpportunityKey, SpreadCandidate, SpreadOpportunity};
