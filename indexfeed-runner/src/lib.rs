//! indexfeed runner: pipeline orchestration around the acquisition engine.
//!
//! This crate builds on `indexfeed-core` to provide:
//! - Pipeline configuration from defaults, TOML and environment
//! - Per-market fetch → normalize → export runs
//! - Canonical table export (CSV, Parquet) with a fixed polars schema

pub mod config;
pub mod export;
pub mod pipeline;
pub mod schema;

pub use config::{ConfigError, MarketEndpoints, PipelineConfig, TableFormat, ENV_PREFIX};
pub use export::{export_table, table_to_csv, table_to_dataframe, ExportError};
pub use pipeline::{MarketRun, NormalizeRun, Pipeline, PipelineError};
pub use schema::{CanonicalSchema, SchemaError};
