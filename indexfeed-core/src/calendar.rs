//! Trading day calculator.
//!
//! Pure logic: given the current instant, the exchange timezone and the hour
//! after which the day's figures are published, derive the anchor trading
//! date and the descending sequence of candidates the backtracker walks.

use crate::domain::TradingDate;
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

/// Hour (local exchange time) before which today's figures are assumed unpublished.
pub const DEFAULT_ANNOUNCE_HOUR: u32 = 16;

/// Derives candidate trading dates from an anchor instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingDayCalculator {
    timezone: Tz,
    announce_hour: u32,
}

impl TradingDayCalculator {
    pub fn new(timezone: Tz, announce_hour: u32) -> Self {
        Self {
            timezone,
            announce_hour,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn announce_hour(&self) -> u32 {
        self.announce_hour
    }

    /// The first date to request.
    ///
    /// An explicit target is only weekend-adjusted. Without one, local time
    /// before the announcement hour means today's data is not out yet, so
    /// the anchor starts from yesterday.
    pub fn anchor(&self, now: DateTime<Utc>, explicit: Option<NaiveDate>) -> TradingDate {
        let date = match explicit {
            Some(date) => date,
            None => {
                let local = now.with_timezone(&self.timezone);
                if local.hour() < self.announce_hour {
                    local.date_naive() - Duration::days(1)
                } else {
                    local.date_naive()
                }
            }
        };
        TradingDate::on_or_before(date)
    }

    /// `max_backtrack + 1` distinct trading dates, strictly descending from the anchor.
    pub fn candidates(
        &self,
        now: DateTime<Utc>,
        explicit: Option<NaiveDate>,
        max_backtrack: usize,
    ) -> Vec<TradingDate> {
        self.anchor(now, explicit).backtrack(max_backtrack)
    }
}

impl Default for TradingDayCalculator {
    fn default() -> Self {
        Self::new(chrono_tz::Asia::Taipei, DEFAULT_ANNOUNCE_HOUR)
    }
}
