//! Trading dates: calendar dates that never fall on a weekend.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A weekday calendar date.
///
/// Only constructed through weekend-adjusting or weekend-rejecting
/// constructors, so every value is a Monday–Friday date. Exchange holidays
/// are not modelled; a holiday simply yields an empty fetch and the
/// backtracker moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "NaiveDate", into = "NaiveDate")]
pub struct TradingDate(NaiveDate);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0} falls on a weekend")]
pub struct WeekendDate(pub NaiveDate);

impl TradingDate {
    /// Roll Saturday and Sunday back to the preceding Friday.
    pub fn on_or_before(date: NaiveDate) -> Self {
        let back = match date.weekday() {
            Weekday::Sat => 1,
            Weekday::Sun => 2,
            _ => 0,
        };
        Self(date - Duration::days(back))
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// The trading day immediately before this one.
    pub fn previous(self) -> Self {
        Self::on_or_before(self.0 - Duration::days(1))
    }

    /// This date followed by `depth` earlier trading days, strictly descending.
    pub fn backtrack(self, depth: usize) -> Vec<TradingDate> {
        let mut dates = Vec::with_capacity(depth + 1);
        let mut current = self;
        dates.push(current);
        for _ in 0..depth {
            current = current.previous();
            dates.push(current);
        }
        dates
    }

    /// `YYYYMMDD`, the form the exchanges take as a request parameter.
    pub fn compact(self) -> String {
        self.0.format("%Y%m%d").to_string()
    }

    /// Parse `YYYYMMDD` or `YYYY-MM-DD`.
    pub fn parse(s: &str) -> Option<NaiveDate> {
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%Y%m%d")
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .ok()
    }
}

impl TryFrom<NaiveDate> for TradingDate {
    type Error = WeekendDate;

    fn try_from(date: NaiveDate) -> Result<Self, Self::Error> {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => Err(WeekendDate(date)),
            _ => Ok(Self(date)),
        }
    }
}

impl From<TradingDate> for NaiveDate {
    fn from(date: TradingDate) -> Self {
        date.0
    }
}

impl fmt::Display for TradingDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}
