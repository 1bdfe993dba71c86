use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn parse_iso(value: &str) -> Option<Self> {
        let value = value.trim();
        // %Y alone would also take two-digit years like "23-01".
        if value.split_once('-')?.0.len() != 4 {
            return None;
        }
        let date = NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").ok()?;
        Self::new(date.year(), date.month())
    }

    pub fn parse_abbreviated(value: &str, month_names: &[String]) -> Option<Self> {
        let (name, year) = value.trim().split_once('-')?;
        let name = name.trim().to_lowercase();
        let position = month_names.iter().position(|m| *m == name)?;
        let year = year.trim();
        if year.len() != 2 {
            return None;
        }
        let year: i32 = year.parse().ok()?;
        Self::new(2000 + year, position as u32 + 1)
    }

    pub fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month)
    }

    pub fn months_until(&self, later: &YearMonth) -> i64 {
        later.ordinal() - self.ordinal()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The scheduled month of a ledger record. Unknown months sort after every
/// known month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScheduledMonth {
    Known(YearMonth),
    Unknown,
}

impl ScheduledMonth {
    pub fn parse(value: &str, month_names: &[String]) -> Self {
        let value = value.trim();
        YearMonth::parse_iso(value)
            .or_else(|| YearMonth::parse_abbreviated(value, month_names))
            .map(ScheduledMonth::Known)
            .unwrap_or(ScheduledMonth::Unknown)
    }

    pub fn known(&self) -> Option<YearMonth> {
        match self {
            ScheduledMonth::Known(month) => Some(*month),
            ScheduledMonth::Unknown => None,
        }
    }

    pub fn months_between(&self, later: &ScheduledMonth) -> i64 {
        match (self.known(), later.known()) {
            (Some(start), Some(end)) => start.months_until(&end),
            _ => 0,
        }
    }
}

impl fmt::Display for ScheduledMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduledMonth::Known(month) => write!(f, "{month}"),
            ScheduledMonth::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for ScheduledMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
