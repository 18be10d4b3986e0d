//! Remote source trait and fetch error types.
//!
//! The RemoteSource trait abstracts over where raw index payloads come from
//! (the exchanges' HTTP endpoints in production, scripted fakes in tests).
//! Sources are two-tiered: a primary endpoint that takes the exact trading
//! date, and an optional bulk endpoint with no date filter.

use crate::domain::TradingDate;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A fetch that did not produce a payload.
///
/// Always transient from the controller's point of view: it is retried
/// locally by the source and then counted as an empty result for that
/// date and tier. It never aborts an acquisition run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("response is not valid JSON: {0}")]
    InvalidBody(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Which endpoint of a source served a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTier {
    Primary,
    Bulk,
}

impl fmt::Display for FetchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchTier::Primary => f.write_str("primary"),
            FetchTier::Bulk => f.write_str("bulk"),
        }
    }
}

/// Trait for raw payload sources.
///
/// Implementations only fetch; deciding whether a payload is usable is the
/// job of the market's `EmptyResultDetector`, and persistence sits above
/// both in the backtrack controller.
pub trait RemoteSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch the payload for one trading date from the primary endpoint.
    fn fetch_dated(&self, date: TradingDate) -> Result<Value, FetchError>;

    /// Fetch the undated bulk collection. `Ok(None)` when the source has no
    /// bulk tier.
    fn fetch_bulk(&self) -> Result<Option<Value>, FetchError>;
}
