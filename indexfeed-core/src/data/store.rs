//! Raw snapshot files and the atomic JSON writer shared with the cache.
//!
//! Layout: `{output_root}/raw/{market}_{YYYYMMDD}.json`
//!
//! Writes go to a `.tmp` sibling and are renamed into place, so a crashed
//! run never leaves a half-written snapshot behind.

use crate::domain::snapshot::snapshot_file_name;
use crate::domain::{Market, RawSnapshot, TradingDate};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to persist or read back an artifact. Fatal for a run.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        source: serde_json::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub(crate) fn write_json_atomic<T: Serialize>(
    path: &Path,
    value: &T,
    what: &'static str,
) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(value)
        .map_err(|source| StorageError::Serialize { what, source })?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).map_err(|source| StorageError::Write {
        path: tmp_path.clone(),
        source,
    })?;

    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        StorageError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Directory of raw snapshots, one file per market and filing date.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    raw_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
        }
    }

    /// Store rooted at `{output_root}/raw`.
    pub fn under(output_root: &Path) -> Self {
        Self::new(output_root.join("raw"))
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn path_for(&self, market: Market, date: TradingDate) -> PathBuf {
        self.raw_dir.join(snapshot_file_name(market, date))
    }

    /// Persist a snapshot, replacing any earlier one for the same market and date.
    pub fn write(&self, snapshot: &RawSnapshot) -> Result<PathBuf, StorageError> {
        let path = self.raw_dir.join(snapshot.file_name());
        write_json_atomic(&path, snapshot, "raw snapshot")?;
        Ok(path)
    }

    pub fn read(&self, path: &Path) -> Result<RawSnapshot, StorageError> {
        let content = fs::read_to_string(path).map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StorageError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Newest snapshot file for a market, by the date in its file name.
    pub fn latest(&self, market: Market) -> Result<Option<PathBuf>, StorageError> {
        if !self.raw_dir.exists() {
            return Ok(None);
        }

        let entries = fs::read_dir(&self.raw_dir).map_err(|source| StorageError::Read {
            path: self.raw_dir.clone(),
            source,
        })?;

        let prefix = format!("{}_", market.id());
        let mut newest: Option<(String, PathBuf)> = None;

        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Read {
                path: self.raw_dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();

            let Some(stamp) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };
            if stamp.len() != 8 || !stamp.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }

            if newest.as_ref().map_or(true, |(best, _)| stamp > best.as_str()) {
                newest = Some((stamp.to_string(), entry.path()));
            }
        }

        Ok(newest.map(|(_, path)| path))
    }
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
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::under(dir.path());
        let snap = RawSnapshot::live(Market::Otc, day(2023, 9, 28), 2, json!([{"Close": "1"}]));

        let path = store.write(&snap).unwrap();
        assert_eq!(path, dir.path().join("raw").join("otc_20230928.json"));
        assert_eq!(store.read(&path).unwrap(), snap);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn rewrite_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::under(dir.path());
        store.write(&RawSnapshot::empty(Market::Otc, day(2023, 9, 28))).unwrap();
        let live = RawSnapshot::live(Market::Otc, day(2023, 9, 28), 0, json!([{"Close": "9"}]));
        let path = store.write(&live).unwrap();
        assert_eq!(store.read(&path).unwrap().payload, json!([{"Close": "9"}]));
    }

    #[test]
    fn latest_picks_newest_date_for_market() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::under(dir.path());
        store.write(&RawSnapshot::empty(Market::Taiex, day(2023, 9, 27))).unwrap();
        store.write(&RawSnapshot::empty(Market::Taiex, day(2023, 9, 28))).unwrap();
        store.write(&RawSnapshot::empty(Market::Otc, day(2023, 9, 29))).unwrap();
        fs::write(store.raw_dir().join("taiex_latest.json"), "{}").unwrap();

        let latest = store.latest(Market::Taiex).unwrap().unwrap();
        assert!(latest.ends_with("taiex_20230928.json"));
    }

    #[test]
    fn latest_on_missing_dir_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::under(&dir.path().join("nowhere"));
        assert!(store.latest(Market::Otc).unwrap().is_none());
    }
}
