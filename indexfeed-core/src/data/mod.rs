//! Data acquisition, caching and snapshot persistence

pub mod backtrack;
pub mod bulk_filter;
pub mod cache;
pub mod detector;
pub mod exchange;
pub mod observer;
pub mod provider;
pub mod store;

pub use backtrack::{
    Acquisition, BacktrackConfig, BacktrackController, MarketStrategy, Resolution,
    DEFAULT_MAX_BACKTRACK,
};
pub use cache::{CacheStatus, CacheStore, JsonFileCache};
pub use detector::{
    detector_for, EmptyResultDetector, RowListDetector, WeightedIndexDetector,
    WEIGHTED_INDEX_KEYWORD,
};
pub use exchange::{Endpoints, ExchangeSource, HttpSettings};
pub use observer::{AcquisitionObserver, AttemptOutcome, NullObserver, TracingObserver};
pub use provider::{FetchError, FetchTier, RemoteSource};
pub use store::{SnapshotStore, StorageError};
