//! Per-market pipeline: acquire → normalize → export.
//!
//! One `Pipeline` owns the configured calendar, cache, snapshot store and
//! normalizer. Markets run one at a time. Only storage and export failures
//! abort a run; every fetch problem is absorbed by the backtrack.

use crate::config::{ConfigError, PipelineConfig};
use crate::export::{export_table, ExportError};
use chrono::{DateTime, NaiveDate, Utc};
use indexfeed_core::data::{
    Acquisition, AcquisitionObserver, BacktrackController, CacheStatus, FetchError,
    JsonFileCache, MarketStrategy, SnapshotStore, StorageError, TracingObserver,
};
use indexfeed_core::domain::{CanonicalTable, Market, RawSnapshot};
use indexfeed_core::{Normalizer, TradingDayCalculator};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("source setup failed: {0}")]
    Source(#[from] FetchError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),
}

/// Outcome of `fetch` for one market.
#[derive(Debug, Clone)]
pub struct MarketRun {
    pub acquisition: Acquisition,
    pub table: CanonicalTable,
    pub outputs: Vec<PathBuf>,
}

/// Outcome of re-normalizing a stored snapshot.
#[derive(Debug, Clone)]
pub struct NormalizeRun {
    pub market: Market,
    pub snapshot_path: PathBuf,
    pub table: CanonicalTable,
    pub outputs: Vec<PathBuf>,
}

pub struct Pipeline {
    config: PipelineConfig,
    calendar: TradingDayCalculator,
    cache: JsonFileCache,
    snapshots: SnapshotStore,
    normalizer: Normalizer,
    observer: Box<dyn AcquisitionObserver>,
}

impl Pipeline {
    /// Validates `config` and lays out stores under its `output_dir`.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let calendar = config.calendar()?;
        let root = config.output_dir.clone();
        Ok(Self {
            calendar,
            cache: JsonFileCache::under(&root),
            snapshots: SnapshotStore::under(&root),
            normalizer: Normalizer::new(config.weighted_keyword.clone()),
            observer: Box::new(TracingObserver),
            config,
        })
    }

    /// Replace the default tracing observer.
    pub fn with_observer(mut self, observer: Box<dyn AcquisitionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn output_root(&self) -> &Path {
        &self.config.output_dir
    }

    pub fn normalized_dir(&self) -> PathBuf {
        self.config.output_dir.join("normalized")
    }

    /// The HTTP strategy for `market` under the configured endpoints.
    pub fn strategy(&self, market: Market) -> Result<MarketStrategy, PipelineError> {
        Ok(MarketStrategy::http(
            market,
            self.config.endpoints(market),
            &self.config.http_settings(),
            &self.config.weighted_keyword,
        )?)
    }

    /// Fetch `market` as of now.
    pub fn fetch(
        &self,
        market: Market,
        explicit: Option<NaiveDate>,
    ) -> Result<MarketRun, PipelineError> {
        self.fetch_at(market, Utc::now(), explicit)
    }

    /// Fetch `market` as if the clock read `now`.
    pub fn fetch_at(
        &self,
        market: Market,
        now: DateTime<Utc>,
        explicit: Option<NaiveDate>,
    ) -> Result<MarketRun, PipelineError> {
        let strategy = self.strategy(market)?;
        self.fetch_with(&strategy, now, explicit)
    }

    /// Run the full pipeline with a caller-supplied strategy.
    pub fn fetch_with(
        &self,
        strategy: &MarketStrategy,
        now: DateTime<Utc>,
        explicit: Option<NaiveDate>,
    ) -> Result<MarketRun, PipelineError> {
        let anchor = self.calendar.anchor(now, explicit);
        tracing::info!(
            market = %strategy.market,
            %anchor,
            source = strategy.source.name(),
            max_backtrack = self.config.max_backtrack,
            "starting acquisition"
        );

        let controller = BacktrackController::new(
            self.config.backtrack(),
            &self.cache,
            &self.snapshots,
            self.observer.as_ref(),
        );
        let acquisition = controller.acquire(strategy, anchor)?;

        let (table, outputs) = self.normalize_and_export(&acquisition.snapshot)?;
        Ok(MarketRun {
            acquisition,
            table,
            outputs,
        })
    }

    /// Fetch every market in turn. Stops at the first fatal error.
    pub fn fetch_all(&self, explicit: Option<NaiveDate>) -> Result<Vec<MarketRun>, PipelineError> {
        let now = Utc::now();
        Market::ALL
            .iter()
            .map(|&market| self.fetch_at(market, now, explicit))
            .collect()
    }

    /// Re-normalize the newest stored snapshot for `market`.
    ///
    /// `Ok(None)` when no snapshot exists yet.
    pub fn normalize_latest(&self, market: Market) -> Result<Option<NormalizeRun>, PipelineError> {
        let Some(path) = self.snapshots.latest(market)? else {
            tracing::warn!(%market, dir = %self.snapshots.raw_dir().display(), "no raw snapshot found");
            return Ok(None);
        };

        let snapshot = self.snapshots.read(&path)?;
        let (table, outputs) = self.normalize_and_export(&snapshot)?;
        Ok(Some(NormalizeRun {
            market,
            snapshot_path: path,
            table,
            outputs,
        }))
    }

    pub fn cache_status(&self) -> Vec<CacheStatus> {
        self.cache.status(&Market::ALL)
    }

    fn normalize_and_export(
        &self,
        snapshot: &RawSnapshot,
    ) -> Result<(CanonicalTable, Vec<PathBuf>), PipelineError> {
        let table = self.normalizer.normalize(snapshot);
        let outputs = export_table(
            &table,
            snapshot.market,
            &self.normalized_dir(),
            self.config.table_format,
        )?;
        tracing::info!(
            market = %snapshot.market,
            date = %snapshot.date,
            rows = table.len(),
            is_cached = snapshot.is_cached,
            "normalized table written"
        );
        Ok((table, outputs))
    }
}
