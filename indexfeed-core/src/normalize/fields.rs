//! Source column names for each canonical field.
//!
//! The exchanges label the same quantity differently across endpoints and
//! languages. Aliases are probed in order; the first one present wins.

/// A canonical column that is read from a source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
    Turnover,
}

impl CanonicalField {
    /// Value columns, in output order.
    pub const VALUES: [CanonicalField; 6] = [
        CanonicalField::Open,
        CanonicalField::High,
        CanonicalField::Low,
        CanonicalField::Close,
        CanonicalField::Volume,
        CanonicalField::Turnover,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::Date => "date",
            CanonicalField::Open => "open",
            CanonicalField::High => "high",
            CanonicalField::Low => "low",
            CanonicalField::Close => "close",
            CanonicalField::Volume => "volume",
            CanonicalField::Turnover => "turnover",
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            CanonicalField::Date => &["日期", "成交日期", "Date", "date", "tradeDate"],
            CanonicalField::Open => &["開盤指數", "開盤價", "OpeningIndex", "OpeningPrice", "Open"],
            CanonicalField::High => &["最高指數", "最高價", "HighestIndex", "HighestPrice", "High"],
            CanonicalField::Low => &["最低指數", "最低價", "LowestIndex", "LowestPrice", "Low"],
            CanonicalField::Close => &[
                "收盤指數",
                "收盤價",
                "ClosingIndex",
                "ClosingPrice",
                "Close",
            ],
            CanonicalField::Volume => &["成交股數", "成交量", "TradeVolume", "Volume"],
            CanonicalField::Turnover => &["成交金額", "成交值", "TradeValue", "Turnover"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn aliases_are_unambiguous() {
        let mut seen = HashSet::new();
        for field in CanonicalField::VALUES.into_iter().chain([CanonicalField::Date]) {
            for alias in field.aliases() {
                assert!(seen.insert(*alias), "{alias} maps to two fields");
            }
        }
    }
}
