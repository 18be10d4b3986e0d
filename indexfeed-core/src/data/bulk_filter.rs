//! Client-side date filter for undated bulk collections.
//!
//! Bulk rows name their date under one of several field names and in one of
//! several textual forms, including the ROC calendar (Gregorian year − 1911).
//! A row is kept when its date text equals one of the target date's forms.

use crate::domain::TradingDate;
use chrono::Datelike;
use serde_json::Value;
use std::collections::HashSet;

/// Field names probed for a row's date, in priority order.
pub const DATE_FIELDS: [&str; 5] = ["date", "Date", "tradeDate", "日期", "time"];

/// Offset between the Gregorian and ROC calendar years.
pub const ROC_YEAR_OFFSET: i32 = 1911;

/// Textual forms the target date may take in a bulk row.
pub fn date_patterns(date: TradingDate) -> HashSet<String> {
    let d = date.date();
    let (y, m, day) = (d.year(), d.month(), d.day());
    HashSet::from([
        format!("{y:04}{m:02}{day:02}"),
        format!("{y:04}-{m:02}-{day:02}"),
        format!("{y:04}/{m:02}/{day:02}"),
        format!("{}/{m:02}/{day:02}", y - ROC_YEAR_OFFSET),
    ])
}

/// Rows of `bulk` whose date matches `date`.
///
/// Anything other than a JSON array yields no rows. Rows that are not
/// objects, or that carry no readable date, are dropped individually.
pub fn filter_rows(bulk: &Value, date: TradingDate) -> Vec<Value> {
    let Value::Array(rows) = bulk else {
        return Vec::new();
    };
    let patterns = date_patterns(date);

    rows.iter()
        .filter(|row| row_date(row).is_some_and(|text| patterns.contains(&text)))
        .cloned()
        .collect()
}

/// Date text of a row: the first non-empty date field, with `.` read as `-`.
fn row_date(row: &Value) -> Option<String> {
    let fields = row.as_object()?;
    let raw = DATE_FIELDS
        .iter()
        .find_map(|name| fields.get(*name).and_then(cell_text))?;
    Some(raw.trim().replace('.', "-"))
}

fn cell_text(cell: &Value) -> Option<String> {
    match cell {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn sept_28() -> TradingDate {
        TradingDate::try_from(NaiveDate::from_ymd_opt(2023, 9, 28).unwrap()).unwrap()
    }

    #[test]
    fn patterns_cover_all_forms() {
        let p = date_patterns(sept_28());
        assert!(p.contains("20230928"));
        assert!(p.contains("2023-09-28"));
        assert!(p.contains("2023/09/28"));
        assert!(p.contains("112/09/28"));
        assert_eq!(p.len(), 4);
    }

    #[test]
    fn matches_each_field_alias() {
        let bulk = json!([
            {"Date": "2023-09-28", "Close": "1"},
            {"date": "112/09/28", "Close": "2"},
            {"tradeDate": 20230928, "Close": "3"},
            {"日期": "2023/09/28", "Close": "4"},
            {"Date": "2023-09-27", "Close": "5"},
        ]);
        let rows = filter_rows(&bulk, sept_28());
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r["Close"] != "5"));
    }

    #[test]
    fn first_present_field_wins() {
        // `date` is probed before `Date`
        let bulk = json!([{"date": "2023-09-27", "Date": "2023-09-28"}]);
        assert!(filter_rows(&bulk, sept_28()).is_empty());
    }

    #[test]
    fn empty_field_falls_through_to_next() {
        let bulk = json!([{"date": "", "Date": "2023-09-28"}]);
        assert_eq!(filter_rows(&bulk, sept_28()).len(), 1);
    }

    #[test]
    fn dotted_dates_read_as_hyphenated() {
        let bulk = json!([{"Date": "2023.09.28"}]);
        assert_eq!(filter_rows(&bulk, sept_28()).len(), 1);
    }

    #[test]
    fn unreadable_rows_are_excluded_not_fatal() {
        let bulk = json!([
            "not a row",
            42,
            {"Close": "no date"},
            {"Date": null},
            {"Date": ["2023-09-28"]},
            {"Date": "2023-09-28"},
        ]);
        assert_eq!(filter_rows(&bulk, sept_28()).len(), 1);
    }

    #[test]
    fn foreign_slash_format_matches_nothing() {
        let bulk = json!([{"Date": "09/28/2023"}, {"Date": "2023/9/28"}]);
        assert!(filter_rows(&bulk, sept_28()).is_empty());
    }

    #[test]
    fn non_list_bulk_yields_nothing() {
        assert!(filter_rows(&json!({"data": []}), sept_28()).is_empty());
        assert!(filter_rows(&json!(null), sept_28()).is_empty());
    }
}
