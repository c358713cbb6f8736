//! Shared primitive types used across the analytics core.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::fmt;

/// An opaque customer identifier, as it appears in the source file.
pub type CustomerId = String;

/// A calendar month, stored as its first day.
///
/// Every transaction belongs to exactly one period; cohorts are keyed by the
/// period of a customer's first transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(NaiveDate);

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn of_date(date: NaiveDate) -> Self {
        // Day 1 exists for every month chrono can represent.
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn of(ts: &NaiveDateTime) -> Self {
        Self::of_date(ts.date())
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// Signed number of calendar months from `self` to `later`.
    pub fn months_until(&self, later: Period) -> i32 {
        (later.year() - self.year()) * 12 + (later.month() as i32 - self.month() as i32)
    }

    /// "May 2024"
    pub fn month_year_label(&self) -> String {
        self.0.format("%B %Y").to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A sum over an optional-valued column, with the count of values that
/// actually contributed. Missing amounts add 0 and are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AmountSum {
    pub total:       f64,
    pub valid_count: usize,
}

impl AmountSum {
    pub fn add(&mut self, amount: Option<f64>) {
        if let Some(a) = amount {
            self.total += a;
            self.valid_count += 1;
        }
    }
}

impl FromIterator<Option<f64>> for AmountSum {
    fn from_iter<I: IntoIterator<Item = Option<f64>>>(iter: I) -> Self {
        let mut sum = AmountSum::default();
        for amount in iter {
            sum.add(amount);
        }
        sum
    }
}
