//! Canonical output records.

use super::{Market, TradingDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed output column order.
pub const CANONICAL_COLUMNS: [&str; 10] = [
    "market",
    "date",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "turnover",
    "is_cached",
    "source_date",
];

/// A coerced numeric cell. Integers stay exact; anything with a decimal
/// point is a float.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One row of the canonical index table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub market: Market,
    /// `YYYY-MM-DD` when the source date could be read, otherwise the
    /// published text unchanged.
    pub date: String,
    pub open: Option<Number>,
    pub high: Option<Number>,
    pub low: Option<Number>,
    pub close: Option<Number>,
    pub volume: Option<Number>,
    pub turnover: Option<Number>,
    pub is_cached: bool,
    pub source_date: TradingDate,
}

impl CanonicalRecord {
    /// The six value columns in output order.
    pub fn values(&self) -> [Option<Number>; 6] {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.turnover,
        ]
    }

    /// True when every value column is null.
    pub fn is_blank(&self) -> bool {
        self.values().iter().all(Option::is_none)
    }
}

/// Normalizer output: zero or more records under the fixed column set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalTable {
    records: Vec<CanonicalRecord>,
}

impl CanonicalTable {
    pub fn new(records: Vec<CanonicalRecord>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &CANONICAL_COLUMNS
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
