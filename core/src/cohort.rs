//! Cohort engine: first-activity cohorts and the retention matrix.
//!
//! Cohort assignment is computed from the records it is given. When those
//! records are a filtered view, a customer's cohort is the first period
//! *inside the filter*, not their first-ever transaction. Narrowing the date
//! range can therefore move customers into later cohorts.
//!
//! Steps:
//!   1. cohort_period(customer) = min transaction period over their records
//!   2. cohort_index(record)    = months(cohort_period → period) + 1
//!   3. cell(cohort, index)     = distinct customers active at that index
//!   4. retention               = cell / cell(cohort, 1) × 100, 1 decimal

use crate::{
    config::DegenerateCohortPolicy,
    error::{AnalyticsError, AnalyticsResult},
    record::Transaction,
    types::Period,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortRow {
    pub cohort_period: Period,
    /// Distinct customers at index 1.
    pub size:          usize,
    /// cohort_index → distinct active customers. Gaps are simply absent.
    pub retained:      BTreeMap<u32, usize>,
    /// cohort_index → retention percentage, rounded to 1 decimal.
    pub retention:     BTreeMap<u32, f64>,
}

impl CohortRow {
    /// "2024-05 (12)"
    pub fn label(&self) -> String {
        format!("{} ({})", self.cohort_period, self.size)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetentionTable {
    /// Every cohort index present anywhere in the data, ascending.
    pub indices: Vec<u32>,
    /// One row per cohort period, ascending.
    pub rows:    Vec<CohortRow>,
}

impl RetentionTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, cohort: Period) -> Option<&CohortRow> {
        self.rows.iter().find(|r| r.cohort_period == cohort)
    }

    pub fn retention(&self, cohort: Period, index: u32) -> Option<f64> {
        self.row(cohort)?.retention.get(&index).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CohortAnalysis {
    pub table:   RetentionTable,
    /// "{period} ({size})", in cohort order.
    pub labels:  Vec<String>,
    /// Cohorts dropped under `DegenerateCohortPolicy::Omit`.
    pub omitted: Vec<Period>,
}

/// cohort_period → cohort_index → distinct customers.
pub type CohortCounts = BTreeMap<Period, BTreeMap<u32, usize>>;

// ── Engine ───────────────────────────────────────────────────────────────────

/// `(year diff) * 12 + (month diff) + 1`; 1 at the cohort's own period.
pub fn cohort_index(cohort: Period, period: Period) -> u32 {
    (cohort.months_until(period) + 1).max(1) as u32
}

/// Each customer's cohort period: the minimum period among their records.
pub fn assign_cohorts(records: &[Transaction]) -> BTreeMap<&str, Period> {
    let mut cohorts: BTreeMap<&str, Period> = BTreeMap::new();
    for tx in records {
        cohorts
            .entry(tx.customer_id.as_str())
            .and_modify(|p| *p = (*p).min(tx.period))
            .or_insert(tx.period);
    }
    cohorts
}

/// Distinct-customer counts per (cohort, index).
pub fn cohort_counts(records: &[Transaction]) -> CohortCounts {
    let cohorts = assign_cohorts(records);

    let mut active: BTreeMap<(Period, u32), BTreeSet<&str>> = BTreeMap::new();
    for tx in records {
        let cohort = cohorts[tx.customer_id.as_str()];
        active
            .entry((cohort, cohort_index(cohort, tx.period)))
            .or_default()
            .insert(tx.customer_id.as_str());
    }

    let mut counts = CohortCounts::new();
    for ((cohort, index), customers) in active {
        counts.entry(cohort).or_default().insert(index, customers.len());
    }
    counts
}

/// Convert a count matrix into retention percentages.
///
/// A row with no index-1 customers has no denominator: under `Fail` this is
/// a `Computation` error, under `Omit` the row is dropped and reported.
pub fn build_retention(
    counts: &CohortCounts,
    policy: DegenerateCohortPolicy,
) -> AnalyticsResult<CohortAnalysis> {
    let mut analysis = CohortAnalysis::default();
    let mut indices = BTreeSet::new();

    for (&cohort, cells) in counts {
        let size = cells.get(&1).copied().unwrap_or(0);
        if size == 0 {
            match policy {
                DegenerateCohortPolicy::Fail => {
                    return Err(AnalyticsError::Computation { cohort: cohort.to_string() });
                }
                DegenerateCohortPolicy::Omit => {
                    log::warn!("Omitting cohort {cohort}: no customers at index 1");
                    analysis.omitted.push(cohort);
                    continue;
                }
            }
        }

        let retention = cells
            .iter()
            .map(|(&index, &n)| (index, round1(n as f64 / size as f64 * 100.0)))
            .collect();
        indices.extend(cells.keys().copied());

        let row = CohortRow {
            cohort_period: cohort,
            size,
            retained: cells.clone(),
            retention,
        };
        analysis.labels.push(row.label());
        analysis.table.rows.push(row);
    }

    analysis.table.indices = indices.into_iter().collect();
    Ok(analysis)
}

/// `compute_cohorts(filtered_records) -> (retention_table, cohort_labels)`,
/// failing on a degenerate cohort.
pub fn compute_cohorts(records: &[Transaction]) -> AnalyticsResult<CohortAnalysis> {
    compute_cohorts_with_policy(records, DegenerateCohortPolicy::Fail)
}

pub fn compute_cohorts_with_policy(
    records: &[Transaction],
    policy: DegenerateCohortPolicy,
) -> AnalyticsResult<CohortAnalysis> {
    let counts = cohort_counts(records);
    let analysis = build_retention(&counts, policy)?;
    log::debug!(
        "cohorts: {} rows, {} indices from {} records",
        analysis.table.rows.len(),
        analysis.table.indices.len(),
        records.len()
    );
    Ok(analysis)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_counts_calendar_months() {
        let may = Period::new(2024, 5).unwrap();
        assert_eq!(cohort_index(may, may), 1);
        assert_eq!(cohort_index(may, Period::new(2024, 7).unwrap()), 3);
        assert_eq!(cohort_index(may, Period::new(2025, 1).unwrap()), 9);
    }

    #[test]
    fn rounding_is_one_decimal() {
        assert_eq!(round1(2.0 / 3.0 * 100.0), 66.7);
        assert_eq!(round1(100.0), 100.0);
    }
}
