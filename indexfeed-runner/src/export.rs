//! Canonical table export, CSV and Parquet.
//!
//! Files land in `{output_root}/normalized/{market}.{csv,parquet}` and are
//! replaced on every run. An empty table still gets a header row (CSV) or a
//! zero-row frame with the full schema (Parquet).

use crate::config::TableFormat;
use crate::schema::{CanonicalSchema, SchemaError};
use chrono::NaiveDate;
use indexfeed_core::domain::{CanonicalRecord, CanonicalTable, Market, Number, CANONICAL_COLUMNS};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("dataframe error: {0}")]
    Frame(#[from] PolarsError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

// ─── CSV ────────────────────────────────────────────────────────────

fn cell(value: Option<Number>) -> String {
    value.map(|n| n.to_string()).unwrap_or_default()
}

fn csv_row(r: &CanonicalRecord) -> [String; 10] {
    [
        r.market.id().to_string(),
        r.date.clone(),
        cell(r.open),
        cell(r.high),
        cell(r.low),
        cell(r.close),
        cell(r.volume),
        cell(r.turnover),
        r.is_cached.to_string(),
        r.source_date.to_string(),
    ]
}

/// Render the table as CSV, header first. Null cells are empty.
pub fn table_to_csv(table: &CanonicalTable) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(CANONICAL_COLUMNS)?;
    for record in table.records() {
        wtr.write_record(csv_row(record))?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))?;
    // every cell came from a String
    Ok(String::from_utf8_lossy(&data).into_owned())
}

// ─── Parquet ────────────────────────────────────────────────────────

fn days_since_epoch(date: NaiveDate) -> i32 {
    // 1970-01-01
    let epoch = NaiveDate::default();
    (date - epoch).num_days() as i32
}

/// Convert the table to a DataFrame matching [`CanonicalSchema`].
pub fn table_to_dataframe(table: &CanonicalTable) -> Result<DataFrame, ExportError> {
    let records = table.records();
    let values = |pick: fn(&CanonicalRecord) -> Option<Number>| -> Vec<Option<f64>> {
        records.iter().map(|r| pick(r).map(Number::as_f64)).collect()
    };

    let markets: Vec<&str> = records.iter().map(|r| r.market.id()).collect();
    let dates: Vec<&str> = records.iter().map(|r| r.date.as_str()).collect();
    let cached: Vec<bool> = records.iter().map(|r| r.is_cached).collect();
    let source_dates: Vec<i32> = records
        .iter()
        .map(|r| days_since_epoch(r.source_date.date()))
        .collect();

    let df = DataFrame::new(vec![
        Column::new("market".into(), markets),
        Column::new("date".into(), dates),
        Column::new("open".into(), values(|r| r.open)),
        Column::new("high".into(), values(|r| r.high)),
        Column::new("low".into(), values(|r| r.low)),
        Column::new("close".into(), values(|r| r.close)),
        Column::new("volume".into(), values(|r| r.volume)),
        Column::new("turnover".into(), values(|r| r.turnover)),
        Column::new("is_cached".into(), cached),
        Column::new("source_date".into(), source_dates).cast(&DataType::Date)?,
    ])?;

    CanonicalSchema::validate(&df)?;
    Ok(df)
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), ExportError> {
    let file = fs::File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}

// ─── Files ──────────────────────────────────────────────────────────

/// Write to a `.tmp` sibling, then rename over `path`.
fn replace_file(
    path: &Path,
    write: impl FnOnce(&Path) -> Result<(), ExportError>,
) -> Result<(), ExportError> {
    let tmp = path.with_extension("tmp");
    write(&tmp)?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Write `table` for `market` under `normalized_dir` in the configured format(s).
///
/// Returns the paths written.
pub fn export_table(
    table: &CanonicalTable,
    market: Market,
    normalized_dir: &Path,
    format: TableFormat,
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(normalized_dir).map_err(|source| ExportError::Io {
        path: normalized_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();

    if format.writes_csv() {
        let path = normalized_dir.join(format!("{}.csv", market.id()));
        let csv = table_to_csv(table)?;
        replace_file(&path, |tmp| {
            fs::write(tmp, csv).map_err(|source| ExportError::Io {
                path: tmp.to_path_buf(),
                source,
            })
        })?;
        written.push(path);
    }

    if format.writes_parquet() {
        let path = normalized_dir.join(format!("{}.parquet", market.id()));
        let mut df = table_to_dataframe(table)?;
        replace_file(&path, |tmp| write_parquet(&mut df, tmp))?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexfeed_core::domain::TradingDate;

    fn sample() -> CanonicalTable {
        CanonicalTable::new(vec![CanonicalRecord {
            market: Market::Otc,
            date: "2023-09-18".into(),
            open: Some(Number::Float(210.11)),
            high: None,
            low: None,
            close: Some(Number::Float(211.45)),
            volume: Some(Number::Int(1_234_567)),
            turnover: None,
            is_cached: true,
            source_date: TradingDate::on_or_before(NaiveDate::from_ymd_opt(2023, 9, 18).unwrap()),
        }])
    }

    #[test]
    fn csv_has_fixed_header_and_empty_nulls() {
        let csv = table_to_csv(&sample()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("market,date,open,high,low,close,volume,turnover,is_cached,source_date")
        );
        assert_eq!(
            lines.next(),
            Some("otc,2023-09-18,210.11,,,211.45,1234567,,true,2023-09-18")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_table_is_header_only() {
        let csv = table_to_csv(&CanonicalTable::empty()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn dataframe_matches_schema() {
        let df = table_to_dataframe(&sample()).unwrap();
        assert_eq!(df.height(), 1);
        assert!(CanonicalSchema::validate(&df).is_ok());

        let empty = table_to_dataframe(&CanonicalTable::empty()).unwrap();
        assert_eq!(empty.height(), 0);
        assert_eq!(empty.width(), 10);
    }

    #[test]
    fn export_writes_requested_formats() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("normalized");

        let written = export_table(&sample(), Market::Otc, &out, TableFormat::Both).unwrap();
        assert_eq!(written, vec![out.join("otc.csv"), out.join("otc.parquet")]);
        assert!(written.iter().all(|p| p.exists()));

        let written = export_table(&sample(), Market::Taiex, &out, TableFormat::Csv).unwrap();
        assert_eq!(written, vec![out.join("taiex.csv")]);
        assert!(!out.join("taiex.parquet").exists());
    }

    #[test]
    fn export_overwrites_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        export_table(&sample(), Market::Otc, dir.path(), TableFormat::Csv).unwrap();
        export_table(&CanonicalTable::empty(), Market::Otc, dir.path(), TableFormat::Csv).unwrap();
        let csv = fs::read_to_string(dir.path().join("otc.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
