//! Domain types for the index acquisition engine

pub mod market;
pub mod record;
pub mod snapshot;
pub mod trading_date;

pub use market::{Market, UnknownMarket};
pub use record::{CanonicalRecord, CanonicalTable, Number, CANONICAL_COLUMNS};
pub use snapshot::{is_blank_payload, CacheRecord, RawSnapshot};
pub use trading_date::{TradingDate, WeekendDate};
