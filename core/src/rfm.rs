//! RFM engine: recency / frequency / monetary quintile scoring and
//! segment assignment.
//!
//! Scoring rules:
//!   - Each axis is cut into 5 equal-population buckets over the whole
//!     customer population of the given records.
//!   - Bucket edges are the 0, 20, .., 100th percentiles with linear
//!     interpolation; the first bucket is closed on both ends, later
//!     buckets are (lo, hi].
//!   - Recency scores are inverted: the most recent customers score 5.
//!   - Frequency is replaced by its first-occurrence rank before cutting,
//!     so repeated integer counts cannot produce duplicate edges.
//!   - Duplicate edges on recency or monetary, or fewer than 5 customers,
//!     are reported as `InsufficientData`. No scores are fabricated.

use crate::{
    error::{AnalyticsError, AnalyticsResult},
    record::Transaction,
    types::{AmountSum, CustomerId},
};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

pub const RFM_BUCKETS: usize = 5;

// ── Segments ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Segment {
    Champions,
    Loyal,
    Recent,
    Frequent,
    #[serde(rename = "Big Spenders")]
    BigSpenders,
    Dormant,
    Others,
}

impl Segment {
    /// First matching rule wins.
    pub fn assign(r: u8, f: u8, m: u8) -> Self {
        if r >= 4 && f >= 4 && m >= 4 {
            Segment::Champions
        } else if f >= 4 && r >= 3 {
            Segment::Loyal
        } else if r >= 4 {
            Segment::Recent
        } else if f >= 4 {
            Segment::Frequent
        } else if m >= 4 {
            Segment::BigSpenders
        } else if r <= 2 && f <= 2 {
            Segment::Dormant
        } else {
            Segment::Others
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Segment::Champions => "Champions",
            Segment::Loyal => "Loyal",
            Segment::Recent => "Recent",
            Segment::Frequent => "Frequent",
            Segment::BigSpenders => "Big Spenders",
            Segment::Dormant => "Dormant",
            Segment::Others => "Others",
        }
    }
}

// ── Profiles ─────────────────────────────────────────────────────────────────

/// One row per customer. Field names double as the CSV export header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmProfile {
    pub customer_id:    CustomerId,
    pub recency_days:   i64,
    pub frequency:      usize,
    pub monetary:       f64,
    /// Transactions whose amount contributed to `monetary`.
    pub monetary_count: usize,
    #[serde(rename = "R_score")]
    pub r_score:        u8,
    #[serde(rename = "F_score")]
    pub f_score:        u8,
    #[serde(rename = "M_score")]
    pub m_score:        u8,
    /// R, F and M digits concatenated, e.g. "545".
    #[serde(rename = "RFM_score")]
    pub rfm_score:      String,
    pub segment:        Segment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmAnalysis {
    pub reference_date: NaiveDateTime,
    /// Ordered by customer id.
    pub profiles:       Vec<RfmProfile>,
}

impl RfmAnalysis {
    /// Customers per segment, largest first; ties keep declaration order.
    /// Segments with no customers are left out.
    pub fn segment_counts(&self) -> Vec<(Segment, usize)> {
        let mut counts: BTreeMap<Segment, usize> = BTreeMap::new();
        for p in &self.profiles {
            *counts.entry(p.segment).or_default() += 1;
        }
        let mut out: Vec<(Segment, usize)> = counts.into_iter().collect();
        out.sort_by(|a, b| b.1.cmp(&a.1));
        out
    }

    pub fn profile(&self, customer_id: &str) -> Option<&RfmProfile> {
        self.profiles.iter().find(|p| p.customer_id == customer_id)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> AnalyticsResult<()> {
        write_rfm_csv(&self.profiles, writer)
    }
}

/// Raw per-customer metrics before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerMetrics {
    pub customer_id:  CustomerId,
    pub last_seen:    NaiveDateTime,
    pub recency_days: i64,
    pub frequency:    usize,
    pub monetary:     AmountSum,
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Default reference date: one day after the latest transaction.
pub fn default_reference_date(records: &[Transaction]) -> Option<NaiveDateTime> {
    records.iter().map(|tx| tx.timestamp).max().map(|ts| ts + Duration::days(1))
}

/// Per-customer recency, frequency and monetary totals, ordered by id.
/// Recency is whole days, floored.
pub fn customer_metrics(records: &[Transaction], reference: NaiveDateTime) -> Vec<CustomerMetrics> {
    let mut by_customer: BTreeMap<&str, (NaiveDateTime, usize, AmountSum)> = BTreeMap::new();
    for tx in records {
        let entry = by_customer
            .entry(tx.customer_id.as_str())
            .or_insert((tx.timestamp, 0, AmountSum::default()));
        entry.0 = entry.0.max(tx.timestamp);
        entry.1 += 1;
        entry.2.add(tx.amount);
    }

    by_customer
        .into_iter()
        .map(|(id, (last_seen, frequency, monetary))| CustomerMetrics {
            customer_id: id.to_string(),
            last_seen,
            recency_days: (reference - last_seen).num_milliseconds().div_euclid(86_400_000),
            frequency,
            monetary,
        })
        .collect()
}

/// `compute_rfm(filtered_records, reference_date_or_none) -> rfm_profiles`.
pub fn compute_rfm(
    records: &[Transaction],
    reference: Option<NaiveDateTime>,
) -> AnalyticsResult<RfmAnalysis> {
    let reference = match reference.or_else(|| default_reference_date(records)) {
        Some(r) => r,
        None => {
            return Err(AnalyticsError::InsufficientData {
                axis: "population",
                reason: "no transactions in range".into(),
            })
        }
    };

    let metrics = customer_metrics(records, reference);
    if metrics.len() < RFM_BUCKETS {
        return Err(AnalyticsError::InsufficientData {
            axis: "population",
            reason: format!(
                "{} customers cannot fill {RFM_BUCKETS} quantile buckets",
                metrics.len()
            ),
        });
    }

    let recency: Vec<f64> = metrics.iter().map(|m| m.recency_days as f64).collect();
    let frequency: Vec<f64> = metrics.iter().map(|m| m.frequency as f64).collect();
    let monetary: Vec<f64> = metrics.iter().map(|m| m.monetary.total).collect();

    let r_buckets = quantile_buckets("recency", &recency)?;
    let f_buckets = quantile_buckets("frequency", &first_occurrence_rank(&frequency))?;
    let m_buckets = quantile_buckets("monetary", &monetary)?;

    let profiles: Vec<RfmProfile> = metrics
        .into_iter()
        .enumerate()
        .map(|(i, m)| {
            let r_score = (RFM_BUCKETS - r_buckets[i]) as u8;
            let f_score = (f_buckets[i] + 1) as u8;
            let m_score = (m_buckets[i] + 1) as u8;
            RfmProfile {
                customer_id: m.customer_id,
                recency_days: m.recency_days,
                frequency: m.frequency,
                monetary: m.monetary.total,
                monetary_count: m.monetary.valid_count,
                r_score,
                f_score,
                m_score,
                rfm_score: format!("{r_score}{f_score}{m_score}"),
                segment: Segment::assign(r_score, f_score, m_score),
            }
        })
        .collect();

    log::debug!("rfm: scored {} customers against {reference}", profiles.len());
    Ok(RfmAnalysis { reference_date: reference, profiles })
}

/// Flat CSV: one row per customer, one column per RFM attribute.
pub fn write_rfm_csv<W: Write>(profiles: &[RfmProfile], writer: W) -> AnalyticsResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for p in profiles {
        wtr.serialize(p)?;
    }
    wtr.flush()?;
    Ok(())
}

// ── Quantile helpers ─────────────────────────────────────────────────────────

/// Ranks 1..=n by value; equal values rank in order of appearance.
pub fn first_occurrence_rank(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    // sort_by is stable, so ties keep their original positions.
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    for (rank, &i) in order.iter().enumerate() {
        ranks[i] = (rank + 1) as f64;
    }
    ranks
}

/// Bucket edges at evenly spaced percentiles (linear interpolation).
/// Returns `None` when any two edges coincide.
pub fn quantile_edges(values: &[f64], buckets: usize) -> Option<Vec<f64>> {
    if values.is_empty() || buckets == 0 {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = (sorted.len() - 1) as f64;

    let edges: Vec<f64> = (0..=buckets)
        .map(|k| {
            let pos = last * k as f64 / buckets as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        })
        .collect();

    edges.windows(2).all(|w| w[0] < w[1]).then_some(edges)
}

/// 0-based bucket of `value`: first bucket whose upper edge is ≥ value.
pub fn bucket_of(value: f64, edges: &[f64]) -> usize {
    let buckets = edges.len().saturating_sub(1);
    edges[1..]
        .iter()
        .position(|&upper| value <= upper)
        .unwrap_or(buckets.saturating_sub(1))
}

fn quantile_buckets(axis: &'static str, values: &[f64]) -> AnalyticsResult<Vec<usize>> {
    let edges = quantile_edges(values, RFM_BUCKETS).ok_or_else(|| AnalyticsError::InsufficientData {
        axis,
        reason: format!("values do not form {RFM_BUCKETS} distinct quantile buckets"),
    })?;
    Ok(values.iter().map(|&v| bucket_of(v, &edges)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_break_ties_by_position() {
        let ranks = first_occurrence_rank(&[3.0, 1.0, 3.0, 1.0]);
        assert_eq!(ranks, vec![3.0, 1.0, 4.0, 2.0]);
    }

    #[test]
    fn edges_interpolate_linearly() {
        let edges = quantile_edges(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 5).unwrap();
        assert_eq!(edges, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let buckets: Vec<usize> = [1.0, 2.0, 2.5, 6.0].iter().map(|&v| bucket_of(v, &edges)).collect();
        assert_eq!(buckets, vec![0, 0, 1, 4]);
    }

    #[test]
    fn duplicate_edges_are_degenerate() {
        assert!(quantile_edges(&[1.0, 1.0, 1.0, 1.0, 1.0, 2.0], 5).is_none());
    }

    #[test]
    fn segment_rules_apply_in_priority_order() {
        assert_eq!(Segment::assign(5, 5, 5), Segment::Champions);
        assert_eq!(Segment::assign(3, 4, 1), Segment::Loyal);
        assert_eq!(Segment::assign(4, 4, 1), Segment::Loyal);
        assert_eq!(Segment::assign(5, 1, 5), Segment::Recent);
        assert_eq!(Segment::assign(2, 5, 5), Segment::Frequent);
        assert_eq!(Segment::assign(3, 3, 4), Segment::BigSpenders);
        assert_eq!(Segment::assign(1, 2, 3), Segment::Dormant);
        assert_eq!(Segment::assign(3, 3, 3), Segment::Others);
    }
}
