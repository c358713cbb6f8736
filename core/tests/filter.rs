use chrono::{NaiveDate, NaiveDateTime};
use remit_analytics_core::{
    config::AnalyticsConfig,
    filter::{filter_records, FilterSpec},
    record::Transaction,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn records() -> Vec<Transaction> {
    vec![
        Transaction::new("c1", at("2024-03-01 00:00:00")).with_country("TUN"),
        Transaction::new("c2", at("2024-03-15 12:00:00")).with_country("MAC"),
        Transaction::new("c3", at("2024-03-31 23:59:59")).with_country("TUN"),
        Transaction::new("c4", at("2024-04-01 00:00:00")).with_country("TUN"),
        Transaction::new("c5", at("2024-03-20 08:00:00")),
    ]
}

fn ids(records: &[Transaction]) -> Vec<&str> {
    records.iter().map(|tx| tx.customer_id.as_str()).collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Both bounds are inclusive at full date-time precision.
#[test]
fn bounds_are_inclusive() {
    let out = filter_records(
        &records(),
        at("2024-03-01 00:00:00"),
        at("2024-03-31 23:59:59"),
        None,
    );
    assert_eq!(ids(&out), vec!["c1", "c2", "c3", "c5"], "source order preserved");
}

/// A whole-day selection ends at 23:59:59 of the end date.
#[test]
fn date_selection_covers_the_whole_end_day() {
    let filter = FilterSpec::for_dates(day(2024, 3, 31), day(2024, 3, 31), None);
    let out = filter.apply(&records());
    assert_eq!(ids(&out), vec!["c3"]);
}

/// The country filter is an exact code match; records without a country
/// never match a country filter.
#[test]
fn country_filter_matches_codes_exactly() {
    let filter = FilterSpec::for_dates(day(2024, 1, 1), day(2024, 12, 31), Some("TUN".into()));
    assert_eq!(ids(&filter.apply(&records())), vec!["c1", "c3", "c4"]);
}

/// "All" resolves to no country filter; display names resolve to codes.
#[test]
fn country_selection_resolution() {
    let config = AnalyticsConfig::default();
    assert_eq!(config.resolve_country_filter("All"), None);
    assert_eq!(config.resolve_country_filter(""), None);
    assert_eq!(config.resolve_country_filter("Morocco").as_deref(), Some("MAC"));
    assert_eq!(config.resolve_country_filter("TUN").as_deref(), Some("TUN"));
}

/// Filtering never mutates its input and an inverted range is simply empty.
#[test]
fn filter_is_pure() {
    let input = records();
    let before = input.clone();
    let out = filter_records(&input, at("2024-05-01 00:00:00"), at("2024-01-01 00:00:00"), None);
    assert!(out.is_empty(), "start after end selects nothing");
    assert_eq!(input, before, "input records unchanged");
}
