use chrono::{Duration, NaiveDate, NaiveDateTime};
use remit_analytics_core::{
    error::AnalyticsError,
    record::Transaction,
    rfm::{compute_rfm, first_occurrence_rank, RfmAnalysis, RfmProfile, Segment},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn noon(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// Ten customers c00..c09 with distinct recency and monetary values.
/// Customer i was last seen on 2024-01-01 + 3i days, spent (i + 1) × 100 on
/// that last visit, and made 1 + i % 3 transactions overall.
fn population() -> Vec<Transaction> {
    let mut records = Vec::new();
    for i in 0..10u32 {
        let id = format!("c{i:02}");
        let last = noon(2024, 1, 1) + Duration::days(3 * i as i64);
        for extra in 0..(i % 3) {
            let earlier = noon(2023, 12, 1) + Duration::days(extra as i64);
            records.push(Transaction::new(id.clone(), earlier));
        }
        records.push(Transaction::new(id, last).with_amount(((i + 1) * 100) as f64));
    }
    records
}

fn score_histogram(analysis: &RfmAnalysis, pick: impl Fn(&RfmProfile) -> u8) -> [usize; 5] {
    let mut hist = [0; 5];
    for p in &analysis.profiles {
        hist[(pick(p) - 1) as usize] += 1;
    }
    hist
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// With ten customers and distinct values, every score 1..=5 is given to
/// exactly two customers on each axis.
#[test]
fn quintiles_split_population_evenly() {
    let analysis = compute_rfm(&population(), None).unwrap();
    assert_eq!(analysis.profiles.len(), 10);

    assert_eq!(score_histogram(&analysis, |p| p.r_score), [2; 5], "R scores");
    assert_eq!(score_histogram(&analysis, |p| p.f_score), [2; 5], "F scores");
    assert_eq!(score_histogram(&analysis, |p| p.m_score), [2; 5], "M scores");
}

/// Repeated frequency counts are broken by first occurrence, so integer ties
/// never collapse quantile edges.
#[test]
fn frequency_ties_break_by_first_occurrence() {
    let ranks = first_occurrence_rank(&[1.0, 2.0, 1.0, 3.0, 1.0]);
    assert_eq!(ranks, vec![1.0, 4.0, 2.0, 5.0, 3.0]);
}

/// Default reference is one day after the latest transaction; recency is in
/// whole days and the most recent customers score R = 5.
#[test]
fn recency_uses_reference_date() {
    let analysis = compute_rfm(&population(), None).unwrap();
    assert_eq!(analysis.reference_date, noon(2024, 1, 29));

    let newest = analysis.profile("c09").unwrap();
    let oldest = analysis.profile("c00").unwrap();
    assert_eq!(newest.recency_days, 1);
    assert_eq!(oldest.recency_days, 28);
    assert_eq!(newest.r_score, 5, "most recent scores highest");
    assert_eq!(oldest.r_score, 1);

    let explicit = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let later = compute_rfm(&population(), Some(explicit)).unwrap();
    assert_eq!(later.profile("c09").unwrap().recency_days, 3, "3.5 days floors to 3");
}

/// A reference half a second before a customer's last transaction is one
/// day in the past for that customer, not zero.
#[test]
fn sub_second_negative_recency_floors_to_minus_one() {
    let reference = noon(2024, 1, 28) - Duration::milliseconds(500);
    let analysis = compute_rfm(&population(), Some(reference)).unwrap();

    assert_eq!(analysis.profile("c09").unwrap().recency_days, -1);
    assert_eq!(analysis.profile("c08").unwrap().recency_days, 2, "2.99 days floors to 2");
}

/// Score strings and segments for the extremes of the population.
#[test]
fn scores_and_segments() {
    let analysis = compute_rfm(&population(), None).unwrap();

    let best = analysis.profile("c08").unwrap();
    assert_eq!(best.rfm_score, "555");
    assert_eq!(best.segment, Segment::Champions);

    let worst = analysis.profile("c00").unwrap();
    assert_eq!(worst.rfm_score, "111");
    assert_eq!(worst.segment, Segment::Dormant);

    let recent = analysis.profile("c09").unwrap();
    assert_eq!(recent.rfm_score, "525");
    assert_eq!(recent.segment, Segment::Recent);

    let total: usize = analysis.segment_counts().iter().map(|(_, n)| n).sum();
    assert_eq!(total, 10, "every customer in exactly one segment");
}

/// Three customers cannot fill five buckets.
#[test]
fn too_few_customers_is_insufficient_data() {
    let records: Vec<Transaction> = (0..3)
        .map(|i| Transaction::new(format!("c{i}"), noon(2024, 1, 1 + i)).with_amount(10.0))
        .collect();
    let err = compute_rfm(&records, None).unwrap_err();
    assert!(
        matches!(err, AnalyticsError::InsufficientData { axis: "population", .. }),
        "expected InsufficientData, got {err}"
    );
}

/// Identical monetary totals collapse every edge; no scores are invented.
#[test]
fn duplicate_monetary_edges_are_reported() {
    let records: Vec<Transaction> = (0..6)
        .map(|i| Transaction::new(format!("c{i}"), noon(2024, 1, 1 + 2 * i)).with_amount(50.0))
        .collect();
    let err = compute_rfm(&records, None).unwrap_err();
    assert!(
        matches!(err, AnalyticsError::InsufficientData { axis: "monetary", .. }),
        "expected monetary InsufficientData, got {err}"
    );
}

/// The CSV export carries one row per customer under the documented header.
#[test]
fn csv_export_has_one_row_per_customer() {
    let analysis = compute_rfm(&population(), None).unwrap();
    let mut out = Vec::new();
    analysis.write_csv(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();

    assert_eq!(
        lines.next(),
        Some("customer_id,recency_days,frequency,monetary,monetary_count,R_score,F_score,M_score,RFM_score,segment")
    );
    assert_eq!(lines.count(), 10);
    assert!(text.contains("c08,"), "c08 present");
}
