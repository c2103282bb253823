//! Integration tests for the spread scanner.
//!
//! Everything except `live` runs against `MockAdapter`s. Live tests hit real
//! exchange endpoints; run with: cargo test --test integration -- --ignored

mod common;
mod live;
mod properties;
mod scenarios;
