//! Markets served by the acquisition engine.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A market whose headline index is acquired daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// Capitalization-weighted index of the primary exchange.
    Taiex,
    /// Headline index of the over-the-counter market.
    Otc,
}

impl Market {
    pub const ALL: [Market; 2] = [Market::Taiex, Market::Otc];

    /// Dataset slug used in file names and cache keys.
    pub fn id(self) -> &'static str {
        match self {
            Market::Taiex => "taiex",
            Market::Otc => "otc",
        }
    }

    /// Label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            Market::Taiex => "TAIEX",
            Market::Otc => "OTC",
        }
    }

    /// Payload written when no live or cached data exists.
    ///
    /// Keeps the shape each market's source normally returns: a table
    /// document for the weighted index, a row list for the OTC index.
    pub fn empty_payload(self) -> Value {
        match self {
            Market::Taiex => json!({}),
            Market::Otc => json!([]),
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown market '{0}' (expected one of: taiex, otc)")]
pub struct UnknownMarket(pub String);

impl FromStr for Market {
    type Err = UnknownMarket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "taiex" => Ok(Market::Taiex),
            "otc" | "tpex" => Ok(Market::Otc),
            _ => Err(UnknownMarket(s.to_string())),
        }
    }
}
