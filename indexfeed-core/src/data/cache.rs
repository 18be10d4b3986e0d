//! Last-known-good cache, one slot per market.
//!
//! Layout: `{output_root}/cache/{market}_last.json`
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity check on read (BLAKE3 payload hash)
//! - Quarantine for corrupt records ({filename}.quarantined)
//!
//! The slot is only ever written after a confirmed non-empty fetch, so it
//! always holds the freshest payload that was actually good.

use super::store::{write_json_atomic, StorageError};
use crate::domain::{is_blank_payload, CacheRecord, Market, TradingDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Read/write access to the per-market last-good slot.
pub trait CacheStore {
    /// The stored record, or `None` when absent or unusable.
    fn read(&self, market: Market) -> Option<CacheRecord>;

    /// Overwrite the market's slot unconditionally.
    fn write(&self, market: Market, date: TradingDate, payload: &Value) -> Result<(), StorageError>;
}

/// JSON file per market.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    cache_dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Cache rooted at `{output_root}/cache`.
    pub fn under(output_root: &Path) -> Self {
        Self::new(output_root.join("cache"))
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `{cache_dir}/{market}_last.json`
    fn record_path(&self, market: Market) -> PathBuf {
        self.cache_dir.join(format!("{}_last.json", market.id()))
    }

    fn quarantine(&self, path: &Path) {
        let target = path.with_extension("json.quarantined");
        tracing::warn!(
            path = %path.display(),
            "quarantining corrupt cache record"
        );
        if let Err(e) = fs::rename(path, &target) {
            tracing::warn!(
                path = %path.display(),
                target = %target.display(),
                error = %e,
                "could not quarantine cache record, leaving it in place"
            );
        }
    }

    /// Last good date per market, for reporting.
    pub fn status(&self, markets: &[Market]) -> Vec<CacheStatus> {
        markets
            .iter()
            .map(|&market| {
                let record = self.read(market);
                CacheStatus {
                    market,
                    cached: record.is_some(),
                    last_good_date: record.as_ref().map(|r| r.last_good_date),
                    cached_at: record.map(|r| r.cached_at),
                }
            })
            .collect()
    }
}

impl CacheStore for JsonFileCache {
    fn read(&self, market: Market) -> Option<CacheRecord> {
        let path = self.record_path(market);
        if !path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(%market, path = %path.display(), error = %e, "cache record unreadable");
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(%market, error = %e, "cache record does not parse");
                self.quarantine(&path);
                return None;
            }
        };

        if record.market != market || !record.is_intact() {
            self.quarantine(&path);
            return None;
        }

        if is_blank_payload(&record.payload) {
            return None;
        }

        Some(record)
    }

    fn write(&self, market: Market, date: TradingDate, payload: &Value) -> Result<(), StorageError> {
        let record = CacheRecord::new(market, date, payload.clone());
        write_json_atomic(&self.record_path(market), &record, "cache record")?;
        tracing::debug!(%market, date = %date, "cache updated");
        Ok(())
    }
}

/// Cache status for a single market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub market: Market,
    pub cached: bool,
    pub last_good_date: Option<TradingDate>,
    pub cached_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> TradingDate {
        TradingDate::try_from(NaiveDate::from_ymd_opt(y, m, d).unwrap()).unwrap()
    }

    #[test]
    fn write_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::under(dir.path());
        let payload = json!([{"Date": "1120918", "Close": "210.5"}]);

        cache.write(Market::Otc, day(2023, 9, 18), &payload).unwrap();
        let record = cache.read(Market::Otc).unwrap();

        assert_eq!(record.last_good_date, day(2023, 9, 18));
        assert_eq!(record.payload, payload);
        assert!(dir.path().join("cache/otc_last.json").exists());
    }

    #[test]
    fn full_precision_floats_survive_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::under(dir.path());
        let payload = json!([{"ClosingIndex": 26559.113514445162_f64, "TradeValue": 0.1_f64 + 0.2_f64}]);

        cache.write(Market::Otc, day(2023, 9, 18), &payload).unwrap();
        let record = cache.read(Market::Otc).unwrap();

        assert_eq!(record.payload, payload);
        assert!(record.is_intact());
        assert!(!cache.cache_dir().join("otc_last.json.quarantined").exists());
    }

    #[test]
    fn read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::under(dir.path());
        assert!(cache.read(Market::Taiex).is_none());
    }

    #[test]
    fn write_overwrites_single_slot() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::under(dir.path());
        cache.write(Market::Otc, day(2023, 9, 18), &json!([1])).unwrap();
        cache.write(Market::Otc, day(2023, 9, 19), &json!([2])).unwrap();

        let record = cache.read(Market::Otc).unwrap();
        assert_eq!(record.last_good_date, day(2023, 9, 19));
        assert_eq!(record.payload, json!([2]));
        assert_eq!(fs::read_dir(cache.cache_dir()).unwrap().count(), 1);
    }

    #[test]
    fn markets_do_not_share_slots() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::under(dir.path());
        cache.write(Market::Otc, day(2023, 9, 18), &json!([1])).unwrap();
        assert!(cache.read(Market::Taiex).is_none());
    }

    #[test]
    fn corrupt_record_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::under(dir.path());
        fs::create_dir_all(cache.cache_dir()).unwrap();
        let path = cache.cache_dir().join("taiex_last.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(cache.read(Market::Taiex).is_none());
        assert!(!path.exists());
        assert!(path.with_extension("json.quarantined").exists());
    }

    #[test]
    fn failed_quarantine_leaves_record_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::under(dir.path());
        let path = cache.cache_dir().join("otc_last.json");
        let blocked = path.with_extension("json.quarantined");
        fs::create_dir_all(blocked.join("occupied")).unwrap();
        fs::write(&path, "{ not json").unwrap();

        assert!(cache.read(Market::Otc).is_none());
        assert!(path.exists());
        assert!(blocked.is_dir());
    }

    #[test]
    fn tampered_payload_fails_integrity_check() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::under(dir.path());
        cache.write(Market::Otc, day(2023, 9, 18), &json!([1])).unwrap();

        let path = cache.cache_dir().join("otc_last.json");
        let mut record: CacheRecord =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        record.payload = json!([1, 2]);
        fs::write(&path, serde_json::to_string(&record).unwrap()).unwrap();

        assert!(cache.read(Market::Otc).is_none());
    }

    #[test]
    fn status_reports_each_market() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::under(dir.path());
        cache.write(Market::Otc, day(2023, 9, 18), &json!([1])).unwrap();

        let statuses = cache.status(&Market::ALL);
        assert_eq!(statuses.len(), 2);
        assert!(!statuses[0].cached);
        assert!(statuses[1].cached);
        assert_eq!(statuses[1].last_good_date, Some(day(2023, 9, 18)));
    }
}
