//! Raw snapshot → canonical table.
//!
//! 1. Classify the payload and locate its data rows.
//! 2. Map source columns onto canonical fields by alias.
//! 3. Coerce numeric and date cells.
//! 4. Tag each row with market and provenance; drop rows with no values.
//!
//! A payload that cannot be read yields an empty table with the full
//! column set. Normalization never fails a run.

pub mod coerce;
pub mod fields;
pub mod payload;

pub use coerce::{coerce_date, coerce_date_value, coerce_net_flow, coerce_number, coerce_value};
pub use fields::CanonicalField;
pub use payload::{PayloadShape, RawPayload, RawRow, SchemaMismatch, TitledTable};

use crate::data::WEIGHTED_INDEX_KEYWORD;
use crate::domain::{CanonicalRecord, CanonicalTable, Number, RawSnapshot, TradingDate};
use chrono::NaiveDate;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    keyword: String,
}

impl Normalizer {
    /// `keyword` selects the weighted-index table among titled tables.
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
        }
    }

    /// Normalize, logging and swallowing schema mismatches.
    pub fn normalize(&self, snapshot: &RawSnapshot) -> CanonicalTable {
        match self.try_normalize(snapshot) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(
                    market = %snapshot.market,
                    date = %snapshot.date,
                    error = %e,
                    "schema mismatch, emitting empty table"
                );
                CanonicalTable::empty()
            }
        }
    }

    pub fn try_normalize(&self, snapshot: &RawSnapshot) -> Result<CanonicalTable, SchemaMismatch> {
        let rows = RawPayload::classify(&snapshot.payload)?.rows(snapshot.market, &self.keyword)?;

        let records = rows
            .iter()
            .map(|row| to_record(row, snapshot))
            .filter(|record| !record.is_blank())
            .collect();

        Ok(CanonicalTable::new(records))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(WEIGHTED_INDEX_KEYWORD)
    }
}

fn cell(row: &RawRow, field: CanonicalField) -> Option<&Value> {
    field
        .aliases()
        .iter()
        .find_map(|alias| row.get(*alias))
        .filter(|v| !v.is_null())
}

fn number(row: &RawRow, field: CanonicalField) -> Option<Number> {
    cell(row, field).and_then(coerce_value)
}

/// An ISO weekday, or `None` for anything else.
fn trading_day(text: &str) -> Option<TradingDate> {
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    TradingDate::try_from(date).ok()
}

fn to_record(row: &RawRow, snapshot: &RawSnapshot) -> CanonicalRecord {
    // cached payloads are re-filed under the anchor; keep that date visible
    let date = if snapshot.is_cached {
        None
    } else {
        cell(row, CanonicalField::Date)
            .and_then(coerce_date_value)
            .and_then(|text| trading_day(&text))
    }
    .unwrap_or(snapshot.date)
    .to_string();

    CanonicalRecord {
        market: snapshot.market,
        date,
        open: number(row, CanonicalField::Open),
        high: number(row, CanonicalField::High),
        low: number(row, CanonicalField::Low),
        close: number(row, CanonicalField::Close),
        volume: number(row, CanonicalField::Volume),
        turnover: number(row, CanonicalField::Turnover),
        is_cached: snapshot.is_cached,
        source_date: snapshot.source_date,
    }
}
