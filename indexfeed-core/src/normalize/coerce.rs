//! Cell coercion: numeric text with separators and dates in mixed calendars.

use crate::data::bulk_filter::ROC_YEAR_OFFSET;
use crate::domain::Number;
use chrono::NaiveDate;
use serde_json::Value;

/// Parse numeric text.
///
/// Thousands separators and every character other than digits, `.` and `-`
/// are stripped first. Text containing a `.` becomes a decimal, anything else
/// an integer. Empty or unparseable text is `None`.
pub fn coerce_number(text: &str) -> Option<Number> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    if cleaned.contains('.') {
        return cleaned.parse::<f64>().ok().map(Number::Float);
    }
    match cleaned.parse::<i64>() {
        Ok(n) => Some(Number::Int(n)),
        // out of i64 range, still a number
        Err(_) => cleaned.parse::<f64>().ok().map(Number::Float),
    }
}

/// Coerce a JSON cell. Numbers pass through; strings go through [`coerce_number`].
pub fn coerce_value(cell: &Value) -> Option<Number> {
    match cell {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Number::Int(i)),
            None => n.as_f64().map(Number::Float),
        },
        Value::String(s) => coerce_number(s),
        _ => None,
    }
}

/// Net-flow columns read invalid cells as zero instead of null.
pub fn coerce_net_flow(cell: &Value) -> Number {
    coerce_value(cell).unwrap_or(Number::Int(0))
}

/// Normalize a date literal to `YYYY-MM-DD` where its form is recognized.
///
/// Accepted forms: `YYYYMMDD`, ROC `YYYMMDD`, and year-month-day separated by
/// `-`, `/` or `.`, where a two- or three-digit year is an ROC year. Anything
/// else, including impossible dates, comes back unchanged.
pub fn coerce_date(literal: &str) -> String {
    parse_date(literal.trim())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| literal.to_string())
}

/// [`coerce_date`] over a JSON cell; integers are read as their digits.
pub fn coerce_date_value(cell: &Value) -> Option<String> {
    match cell {
        Value::String(s) if !s.trim().is_empty() => Some(coerce_date(s)),
        Value::Number(n) => Some(coerce_date(&n.to_string())),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.chars().all(|c| c.is_ascii_digit()) {
        return match s.len() {
            8 => ymd(&s[..4], &s[4..6], &s[6..]),
            7 => ymd(&s[..3], &s[3..5], &s[5..]),
            _ => None,
        };
    }

    let parts: Vec<&str> = s.split(['-', '/', '.']).collect();
    let [y, m, d] = parts.as_slice() else {
        return None;
    };
    if !(2..=4).contains(&y.len()) || !(1..=2).contains(&m.len()) || !(1..=2).contains(&d.len()) {
        return None;
    }
    ymd(y, m, d)
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !(all_digits(y) && all_digits(m) && all_digits(d)) {
        return None;
    }

    let mut year: i32 = y.parse().ok()?;
    if y.len() < 4 && year < ROC_YEAR_OFFSET {
        year += ROC_YEAR_OFFSET;
    }
    NaiveDate::from_ymd_opt(year, m.parse().ok()?, d.parse().ok()?)
}
