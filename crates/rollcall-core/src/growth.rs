//! Monthly registration growth
//!
//! Counts registrations per calendar month between the earliest and latest
//! registration. Months with no registrations appear with a zero count so
//! the series can be charted directly.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};

use crate::account::Account;

/// A calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    /// 1-based month
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
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

/// Number of registrations in one month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    pub month: YearMonth,
    pub count: usize,
}

/// Registrations per month, oldest first, with gap months filled with zero.
pub fn monthly_registrations<'a, I>(accounts: I) -> Vec<MonthlyCount>
where
    I: IntoIterator<Item = &'a Account>,
{
    let mut counts: BTreeMap<YearMonth, usize> = BTreeMap::new();
    for account in accounts {
        *counts.entry(YearMonth::of(account.registered_on)).or_default() += 1;
    }

    let (Some(&first), Some(&last)) = (counts.keys().next(), counts.keys().next_back()) else {
        return Vec::new();
    };

    let mut series = Vec::new();
    let mut month = first;
    while month <= last {
        series.push(MonthlyCount {
            month,
            count: counts.get(&month).copied().unwrap_or(0),
        });
        month = month.next();
    }
    series
}
