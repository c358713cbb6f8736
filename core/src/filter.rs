//! Filter engine: restricts the canonical dataset to a closed date-time
//! range and an optional country code. Never mutates its input.

use crate::record::Transaction;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    pub start:   NaiveDateTime,
    pub end:     NaiveDateTime,
    pub country: Option<String>,
}

impl FilterSpec {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, country: Option<String>) -> Self {
        Self { start, end, country }
    }

    /// Whole-day selection: `start` at 00:00:00 through `end` at 23:59:59.
    pub fn for_dates(start: NaiveDate, end: NaiveDate, country: Option<String>) -> Self {
        Self {
            start: start.and_hms_opt(0, 0, 0).unwrap_or_default(),
            end: end.and_hms_opt(23, 59, 59).unwrap_or_default(),
            country,
        }
    }

    /// Both bounds inclusive, full date-time precision; country is an exact
    /// code match.
    pub fn matches(&self, tx: &Transaction) -> bool {
        tx.timestamp >= self.start
            && tx.timestamp <= self.end
            && self
                .country
                .as_deref()
                .is_none_or(|c| tx.country.as_deref() == Some(c))
    }

    /// Lazy view over the matching records, in source order.
    pub fn iter<'a>(&'a self, records: &'a [Transaction]) -> impl Iterator<Item = &'a Transaction> + 'a {
        records.iter().filter(move |tx| self.matches(tx))
    }

    pub fn apply(&self, records: &[Transaction]) -> Vec<Transaction> {
        let filtered: Vec<Transaction> = self.iter(records).cloned().collect();
        log::debug!(
            "filter {}..={} country={:?}: {} of {} records",
            self.start,
            self.end,
            self.country,
            filtered.len(),
            records.len()
        );
        filtered
    }
}

/// `filter(records, start_inclusive, end_inclusive, country_or_none)`.
pub fn filter_records(
    records: &[Transaction],
    start: NaiveDateTime,
    end: NaiveDateTime,
    country: Option<&str>,
) -> Vec<Transaction> {
    FilterSpec::new(start, end, country.map(str::to_string)).apply(records)
}
