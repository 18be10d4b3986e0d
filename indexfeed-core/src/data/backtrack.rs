//! Backtracking acquisition.
//!
//! Walks the candidate dates newest-first. For each date the primary tier is
//! tried, then the bulk tier filtered to that date. The first payload the
//! market's detector accepts is persisted and becomes the new cache record.
//! When every candidate fails the run resolves to the cached payload (if any
//! and if enabled) or to an explicit empty payload, both filed under the
//! anchor date. Every run writes exactly one snapshot.

use super::bulk_filter::filter_rows;
use super::cache::CacheStore;
use super::detector::{detector_for, EmptyResultDetector};
use super::exchange::{Endpoints, ExchangeSource, HttpSettings};
use super::observer::{AcquisitionObserver, AttemptOutcome};
use super::provider::{FetchError, FetchTier, RemoteSource};
use super::store::{SnapshotStore, StorageError};
use crate::domain::{Market, RawSnapshot, TradingDate};
use crate::normalize::PayloadShape;
use serde_json::Value;
use std::cell::OnceCell;
use std::path::PathBuf;

/// Default number of earlier trading days tried after the anchor.
pub const DEFAULT_MAX_BACKTRACK: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktrackConfig {
    pub max_backtrack: usize,
    /// Fall back to the last good payload when every candidate fails.
    pub use_cache: bool,
}

impl Default for BacktrackConfig {
    fn default() -> Self {
        Self {
            max_backtrack: DEFAULT_MAX_BACKTRACK,
            use_cache: true,
        }
    }
}

/// A market's source and emptiness predicate, as one unit.
pub struct MarketStrategy {
    pub market: Market,
    pub source: Box<dyn RemoteSource>,
    pub detector: Box<dyn EmptyResultDetector>,
}

impl MarketStrategy {
    pub fn new(
        market: Market,
        source: Box<dyn RemoteSource>,
        detector: Box<dyn EmptyResultDetector>,
    ) -> Self {
        Self {
            market,
            source,
            detector,
        }
    }

    /// HTTP-backed strategy for a market.
    pub fn http(
        market: Market,
        endpoints: Endpoints,
        settings: &HttpSettings,
        weighted_keyword: &str,
    ) -> Result<Self, FetchError> {
        let source = ExchangeSource::new(market, endpoints, settings)?;
        Ok(Self::new(
            market,
            Box::new(source),
            detector_for(market, weighted_keyword),
        ))
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Candidate `attempt` (0 = anchor) had data.
    Found { attempt: usize, date: TradingDate },
    /// All candidates failed; the cached payload from `source_date` was used.
    CacheFallback { source_date: TradingDate },
    /// All candidates failed and no usable cache existed.
    EmptyFallback,
}

impl Resolution {
    pub fn is_live(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }
}

/// Result of one acquisition run.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub market: Market,
    pub resolution: Resolution,
    pub snapshot: RawSnapshot,
    /// Where the snapshot was written.
    pub path: PathBuf,
    /// Candidate dates, anchor first.
    pub candidates: Vec<TradingDate>,
}

pub struct BacktrackController<'a> {
    config: BacktrackConfig,
    cache: &'a dyn CacheStore,
    snapshots: &'a SnapshotStore,
    observer: &'a dyn AcquisitionObserver,
}

impl<'a> BacktrackController<'a> {
    pub fn new(
        config: BacktrackConfig,
        cache: &'a dyn CacheStore,
        snapshots: &'a SnapshotStore,
        observer: &'a dyn AcquisitionObserver,
    ) -> Self {
        Self {
            config,
            cache,
            snapshots,
            observer,
        }
    }

    pub fn config(&self) -> BacktrackConfig {
        self.config
    }

    /// Run the backtrack from `anchor`. Only storage failures are errors.
    pub fn acquire(
        &self,
        strategy: &MarketStrategy,
        anchor: TradingDate,
    ) -> Result<Acquisition, StorageError> {
        let market = strategy.market;
        let candidates = anchor.backtrack(self.config.max_backtrack);
        let bulk = OnceCell::new();

        for (attempt, &date) in candidates.iter().enumerate() {
            if let Some(payload) = self.try_date(strategy, &bulk, attempt, date) {
                let snapshot = RawSnapshot::live(market, date, attempt, payload);
                let path = self.snapshots.write(&snapshot)?;
                self.cache.write(market, date, &snapshot.payload)?;
                return Ok(self.finish(
                    Resolution::Found { attempt, date },
                    snapshot,
                    path,
                    candidates,
                ));
            }
        }

        let cached = if self.config.use_cache {
            self.cache.read(market)
        } else {
            None
        };

        let (resolution, snapshot) = match cached {
            Some(record) => (
                Resolution::CacheFallback {
                    source_date: record.last_good_date,
                },
                RawSnapshot::from_cache(anchor, record),
            ),
            None => (Resolution::EmptyFallback, RawSnapshot::empty(market, anchor)),
        };

        let path = self.snapshots.write(&snapshot)?;
        Ok(self.finish(resolution, snapshot, path, candidates))
    }

    fn finish(
        &self,
        resolution: Resolution,
        snapshot: RawSnapshot,
        path: PathBuf,
        candidates: Vec<TradingDate>,
    ) -> Acquisition {
        self.observer
            .on_resolved(snapshot.market, &resolution, snapshot.date);
        Acquisition {
            market: snapshot.market,
            resolution,
            snapshot,
            path,
            candidates,
        }
    }

    /// Primary tier, then the bulk tier filtered to `date`.
    fn try_date(
        &self,
        strategy: &MarketStrategy,
        bulk: &OnceCell<Result<Option<Value>, FetchError>>,
        attempt: usize,
        date: TradingDate,
    ) -> Option<Value> {
        let market = strategy.market;
        let detector = strategy.detector.as_ref();

        let primary = strategy.source.fetch_dated(date);
        let outcome = judge(market, detector, &primary);
        self.observer
            .on_fetch(market, attempt, date, FetchTier::Primary, &outcome);
        if let (AttemptOutcome::Accepted { .. }, Ok(payload)) = (&outcome, primary) {
            return Some(payload);
        }

        let fetched = bulk.get_or_init(|| strategy.source.fetch_bulk());
        let filtered = match fetched {
            Ok(None) => return None,
            Ok(Some(collection)) => Ok(Value::Array(filter_rows(collection, date))),
            Err(e) => Err(e.clone()),
        };

        let outcome = judge(market, detector, &filtered);
        self.observer
            .on_fetch(market, attempt, date, FetchTier::Bulk, &outcome);
        match (outcome, filtered) {
            (AttemptOutcome::Accepted { .. }, Ok(payload)) => Some(payload),
            _ => None,
        }
    }
}

fn judge(
    market: Market,
    detector: &dyn EmptyResultDetector,
    fetched: &Result<Value, FetchError>,
) -> AttemptOutcome {
    match fetched {
        Err(e) => AttemptOutcome::Failed {
            error: e.to_string(),
        },
        Ok(payload) => {
            let rows = detector.row_count(payload);
            if rows > 0 {
                return AttemptOutcome::Accepted { rows };
            }
            let shape = PayloadShape::of(payload);
            if !shape.is_published_by(market) {
                AttemptOutcome::Rejected { shape: shape.name() }
            } else {
                AttemptOutcome::Empty
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cache::JsonFileCache;
    use crate::data::detector::RowListDetector;
    use crate::data::observer::NullObserver;
    use chrono::NaiveDate;
    use serde_json::json;

    struct Fixed(Result<Value, FetchError>);

    impl RemoteSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn fetch_dated(&self, _: TradingDate) -> Result<Value, FetchError> {
            self.0.clone()
        }
        fn fetch_bulk(&self) -> Result<Option<Value>, FetchError> {
            Ok(None)
        }
    }

    fn friday() -> TradingDate {
        TradingDate::try_from(NaiveDate::from_ymd_opt(2023, 9, 29).unwrap()).unwrap()
    }

    #[test]
    fn judge_classifies_outcomes() {
        let d = RowListDetector;
        assert_eq!(
            judge(Market::Otc, &d, &Ok(json!([{"Close": "1"}]))),
            AttemptOutcome::Accepted { rows: 1 }
        );
        assert_eq!(judge(Market::Otc, &d, &Ok(json!([]))), AttemptOutcome::Empty);
        assert_eq!(
            judge(Market::Otc, &d, &Ok(json!({"tables": [{"title": "x", "data": [[1]]}]}))),
            AttemptOutcome::Rejected {
                shape: "titled_tables"
            }
        );
        assert!(matches!(
            judge(Market::Otc, &d, &Err(FetchError::Timeout("slow".into()))),
            AttemptOutcome::Failed { .. }
        ));
    }

    #[test]
    fn zero_backtrack_tries_only_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::under(dir.path());
        let snapshots = SnapshotStore::under(dir.path());
        let config = BacktrackConfig {
            max_backtrack: 0,
            use_cache: true,
        };
        let controller = BacktrackController::new(config, &cache, &snapshots, &NullObserver);
        let strategy = MarketStrategy::new(
            Market::Otc,
            Box::new(Fixed(Ok(json!([])))),
            Box::new(RowListDetector),
        );

        let acq = controller.acquire(&strategy, friday()).unwrap();
        assert_eq!(acq.candidates, vec![friday()]);
        assert_eq!(acq.resolution, Resolution::EmptyFallback);
        assert_eq!(acq.snapshot.payload, json!([]));
    }
}
