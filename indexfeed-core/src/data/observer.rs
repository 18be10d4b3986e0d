//! Acquisition progress events.
//!
//! The controller never prints; it reports each fetch attempt and the final
//! resolution to an injected observer.

use super::backtrack::Resolution;
use super::provider::FetchTier;
use crate::domain::{Market, TradingDate};
use std::fmt;

/// What one fetch attempt amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Payload passed the empty-result check.
    Accepted { rows: usize },
    /// Payload parsed but carried no rows for the date.
    Empty,
    /// Payload had rows in a shape this market does not publish; discarded.
    Rejected { shape: &'static str },
    /// Transport or parse failure after local retries.
    Failed { error: String },
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Accepted { rows } => write!(f, "accepted ({rows} rows)"),
            AttemptOutcome::Empty => f.write_str("empty"),
            AttemptOutcome::Rejected { shape } => write!(f, "rejected ({shape})"),
            AttemptOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Callback for acquisition runs.
pub trait AcquisitionObserver {
    /// Called after every fetch, once per tier tried for a candidate date.
    fn on_fetch(
        &self,
        market: Market,
        attempt: usize,
        date: TradingDate,
        tier: FetchTier,
        outcome: &AttemptOutcome,
    );

    /// Called once when the run reaches a terminal state.
    fn on_resolved(&self, market: Market, resolution: &Resolution, filed_under: TradingDate);
}

/// Observer that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl AcquisitionObserver for TracingObserver {
    fn on_fetch(
        &self,
        market: Market,
        attempt: usize,
        date: TradingDate,
        tier: FetchTier,
        outcome: &AttemptOutcome,
    ) {
        match outcome {
            AttemptOutcome::Accepted { rows } => {
                tracing::info!(%market, attempt, %date, %tier, rows, outcome = "accepted", "fetch accepted");
            }
            AttemptOutcome::Empty => {
                tracing::debug!(%market, attempt, %date, %tier, outcome = "empty", "no rows for date");
            }
            AttemptOutcome::Rejected { shape } => {
                tracing::warn!(%market, attempt, %date, %tier, shape, outcome = "rejected", "unexpected payload shape discarded");
            }
            AttemptOutcome::Failed { error } => {
                tracing::warn!(%market, attempt, %date, %tier, error = %error, outcome = "failed", "fetch failed");
            }
        }
    }

    fn on_resolved(&self, market: Market, resolution: &Resolution, filed_under: TradingDate) {
        match resolution {
            Resolution::Found { attempt, date } => {
                tracing::info!(%market, attempt, %date, outcome = "found", "acquired live data");
            }
            Resolution::CacheFallback { source_date } => {
                tracing::warn!(
                    %market,
                    date = %filed_under,
                    %source_date,
                    outcome = "cache_fallback",
                    "backtrack exhausted, using cached payload"
                );
            }
            Resolution::EmptyFallback => {
                tracing::warn!(%market, date = %filed_under, outcome = "empty_fallback", "backtrack exhausted, no cache");
            }
        }
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl AcquisitionObserver for NullObserver {
    fn on_fetch(&self, _: Market, _: usize, _: TradingDate, _: FetchTier, _: &AttemptOutcome) {}

    fn on_resolved(&self, _: Market, _: &Resolution, _: TradingDate) {}
}
