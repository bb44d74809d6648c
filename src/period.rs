use crate::error::{Result, TradeMapError};
use chrono::{Datelike, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// A calendar month, the time axis of the dataset. Displays as `YYYY-MM`.
///
/// Stored as the first day of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(NaiveDate);

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// The following calendar month; `None` past the end of the calendar
    pub fn succ(&self) -> Option<Self> {
        self.0.checked_add_months(Months::new(1)).map(Self)
    }
}

/// Exactly four ASCII digits, a dash and two ASCII digits
fn is_month_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 7
        && bytes[4] == b'-'
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[5..].iter().all(u8::is_ascii_digit)
}

impl FromStr for Period {
    type Err = TradeMapError;

    fn from_str(s: &str) -> Result<Self> {
        let label = s.trim();
        if !is_month_label(label) {
            return Err(TradeMapError::Period {
                input: s.to_string(),
            });
        }
        NaiveDate::parse_from_str(&format!("{label}-01"), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| TradeMapError::Period {
                input: s.to_string(),
            })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

/// Every month from `start` to `end` inclusive. Empty if `end` precedes `start`.
pub fn month_labels(start: Period, end: Period) -> Vec<Period> {
    let mut labels = Vec::new();
    let mut current = Some(start);
    while let Some(period) = current.filter(|p| *p <= end) {
        labels.push(period);
        current = period.succ();
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Period {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let period = p("2003-07");
        assert_eq!(period.year(), 2003);
        assert_eq!(period.month(), 7);
        assert_eq!(period.to_string(), "2003-07");
        assert_eq!(Period::new(2003, 7), Some(period));
    }

    #[test]
    fn test_parse_rejects_bad_labels() {
        for bad in ["2003-13", "2003-00", "2003-7", "03-07", "2003/07", "", "abcd-ef", "2003-07-01"] {
            assert!(bad.parse::<Period>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_parse_rejects_signed_years() {
        for bad in ["+999-01", "-999-01", "+2000-01", "2000-+1"] {
            assert!(bad.parse::<Period>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_labels_survive_display() {
        for label in ["0999-01", "2000-12", "2024-03"] {
            assert_eq!(p(label).to_string(), label);
        }
    }

    #[test]
    fn test_month_labels_roll_over_year() {
        let labels = month_labels(p("2000-01"), p("2001-02"));
        assert_eq!(labels.len(), 14);
        assert_eq!(labels[0].to_string(), "2000-01");
        assert_eq!(labels[11].to_string(), "2000-12");
        assert_eq!(labels[12].to_string(), "2001-01");
        assert_eq!(labels[13].to_string(), "2001-02");
        for pair in labels.windows(2) {
            assert_eq!(pair[0].succ(), Some(pair[1]));
        }
    }

    #[test]
    fn test_month_labels_empty_when_reversed() {
        assert!(month_labels(p("2001-01"), p("2000-12")).is_empty());
        assert_eq!(month_labels(p("2001-01"), p("2001-01")).len(), 1);
    }

    #[test]
    fn test_ordering() {
        assert!(p("1999-12") < p("2000-01"));
        assert!(p("2000-02") > p("2000-01"));
    }
}
