//! Empty-result detection.
//!
//! The exchanges answer "no data for that day" with a structurally valid
//! document, so an HTTP success says nothing about whether the date was a
//! trading day. Each market gets a predicate over the parsed payload.

use crate::domain::Market;
use serde_json::Value;

/// Title keyword of the weighted-index table in the primary exchange's report.
pub const WEIGHTED_INDEX_KEYWORD: &str = "發行量加權";

/// Market-specific predicate: does this payload hold real rows?
pub trait EmptyResultDetector: Send + Sync {
    /// Number of data rows the payload carries for this market.
    fn row_count(&self, payload: &Value) -> usize;

    fn has_data(&self, payload: &Value) -> bool {
        self.row_count(payload) > 0
    }
}

/// Weighted-index report: `{"tables": [{"title": ..., "data": [...]}, ...]}`.
///
/// Non-empty iff the first table whose title contains the keyword has rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedIndexDetector {
    keyword: String,
}

impl WeightedIndexDetector {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
        }
    }
}

impl Default for WeightedIndexDetector {
    fn default() -> Self {
        Self::new(WEIGHTED_INDEX_KEYWORD)
    }
}

impl EmptyResultDetector for WeightedIndexDetector {
    fn row_count(&self, payload: &Value) -> usize {
        let Some(tables) = payload.get("tables").and_then(Value::as_array) else {
            return 0;
        };
        tables
            .iter()
            .find(|table| {
                table
                    .get("title")
                    .and_then(Value::as_str)
                    .is_some_and(|title| title.contains(self.keyword.as_str()))
            })
            .and_then(|table| table.get("data"))
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

/// Row-list sources: a bare list, or a mapping with a list under `data`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowListDetector;

impl EmptyResultDetector for RowListDetector {
    fn row_count(&self, payload: &Value) -> usize {
        match payload {
            Value::Array(rows) => rows.len(),
            Value::Object(map) => map.get("data").and_then(Value::as_array).map_or(0, Vec::len),
            _ => 0,
        }
    }
}

/// The detector each market's source needs.
pub fn detector_for(market: Market, weighted_keyword: &str) -> Box<dyn EmptyResultDetector> {
    match market {
        Market::Taiex => Box::new(WeightedIndexDetector::new(weighted_keyword)),
        Market::Otc => Box::new(RowListDetector),
    }
}
