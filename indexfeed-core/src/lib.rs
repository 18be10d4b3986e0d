//! indexfeed core: acquisition engine and normalizer for daily market-index data.
//!
//! This crate contains:
//! - Domain types (markets, trading dates, snapshots, cache records, canonical rows)
//! - Trading-day calculator in the exchange's timezone
//! - Remote sources with a dated primary tier and an undated bulk tier
//! - Backtracking controller with cache and empty fallbacks
//! - Normalizer from raw exchange payloads to the canonical table

pub mod calendar;
pub mod data;
pub mod domain;
pub mod normalize;

pub use calendar::TradingDayCalculator;
pub use normalize::Normalizer;
