//! Raw snapshots and cache records, the persisted forms of fetched payloads.

use super::{Market, TradingDate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The payload an acquisition run resolved to, tagged with where it came from.
///
/// Exactly one snapshot is written per run. `date` is the date the snapshot
/// is filed under; `source_date` is the date the payload actually belongs to
/// (they differ only for cache fallbacks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub market: Market,
    pub date: TradingDate,
    /// Index into the candidate date sequence; `None` for fallbacks.
    pub attempt_index: Option<usize>,
    pub is_cached: bool,
    pub source_date: TradingDate,
    pub payload: Value,
}

impl RawSnapshot {
    /// Snapshot of a live fetch that passed the empty-result check.
    pub fn live(market: Market, date: TradingDate, attempt_index: usize, payload: Value) -> Self {
        Self {
            market,
            date,
            attempt_index: Some(attempt_index),
            is_cached: false,
            source_date: date,
            payload,
        }
    }

    /// Snapshot refilled from the last known good payload, filed under `anchor`.
    pub fn from_cache(anchor: TradingDate, record: CacheRecord) -> Self {
        Self {
            market: record.market,
            date: anchor,
            attempt_index: None,
            is_cached: true,
            source_date: record.last_good_date,
            payload: record.payload,
        }
    }

    /// Explicit empty result, filed under `anchor`.
    pub fn empty(market: Market, anchor: TradingDate) -> Self {
        Self {
            market,
            date: anchor,
            attempt_index: None,
            is_cached: false,
            source_date: anchor,
            payload: market.empty_payload(),
        }
    }

    /// `{market}_{YYYYMMDD}.json`
    pub fn file_name(&self) -> String {
        snapshot_file_name(self.market, self.date)
    }
}

pub(crate) fn snapshot_file_name(market: Market, date: TradingDate) -> String {
    format!("{}_{}.json", market.id(), date.compact())
}

/// Last confirmed non-empty payload for a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub market: Market,
    pub last_good_date: TradingDate,
    pub payload: Value,
    /// BLAKE3 over the compact JSON encoding of `payload`.
    pub payload_hash: String,
    pub cached_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn new(market: Market, last_good_date: TradingDate, payload: Value) -> Self {
        let payload_hash = payload_hash(&payload);
        Self {
            market,
            last_good_date,
            payload,
            payload_hash,
            cached_at: Utc::now(),
        }
    }

    /// True when the stored hash still matches the stored payload.
    pub fn is_intact(&self) -> bool {
        self.payload_hash == payload_hash(&self.payload)
    }
}

fn payload_hash(payload: &Value) -> String {
    blake3::hash(payload.to_string().as_bytes())
        .to_hex()
        .to_string()
}

/// True for `null`, `{}` and `[]`.
pub fn is_blank_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(rows) => rows.is_empty(),
        _ => false,
    }
}
