use chrono::NaiveDate;
use remit_analytics_core::{
    config::{AnalyticsConfig, DegenerateCohortPolicy},
    filter::FilterSpec,
    ingest::read_csv,
    report::{DashboardReport, Section},
    Transaction,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

const EXPORT_CSV: &str = "\
id_client,createdAt,amountToSend,status,distributionChannel,country,gov,ville,network,promoCode,reason,nbTransactionsPaid
c1,2024-01-05 10:00:00,100,complete,Cash pickup,Tunisia,Tunis,Marsa,Poste,SPRING,Family,1
c2,2024-01-06 11:00:00,200,canceled,Bank transfer,Tunisia,Tunis,Marsa,Poste,,Family,1
c3,2024-01-07 12:00:00,300,complete,Cash pickup,Morocco,Casablanca,Anfa,Wafacash,,Education,1
c1,2024-02-05 10:00:00,150,cancelled,Cash pickup,Tunisia,Tunis,Marsa,Poste,spring,Family,2
c4,2024-02-10 09:30:00,400,in progress,Bank transfer,Tunisia,Sfax,Sfax,,,Gift,1
c5,2024-03-01 08:00:00,500,complete,Cash pickup,Morocco,Rabat,Agdal,Wafacash,,Family,1
c2,2024-03-03 16:45:00,250,complete,Bank transfer,Tunisia,Tunis,Marsa,Poste,,Family,2
c6,2024-03-12 19:00:00,50,complete,Cash pickup,Tunisia,Tunis,Bardo,Poste,,Health,1
";

fn load() -> (Vec<Transaction>, AnalyticsConfig) {
    let config = AnalyticsConfig::default();
    let data = read_csv(EXPORT_CSV.as_bytes(), &config).unwrap();
    assert_eq!(data.report.rows_kept, 8, "fixture rows all valid");
    (data.records, config)
}

fn full_range() -> FilterSpec {
    FilterSpec::for_dates(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        None,
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Every section is filled for a healthy dataset.
#[test]
fn report_over_full_range() {
    let (records, config) = load();
    let report = DashboardReport::build(&records, &full_range(), &config, None).unwrap();

    assert_eq!(report.record_count, 8);
    assert_eq!(report.status_breakdown.transactions.cancelled, 2);
    assert!(report.kpis.is_some());
    assert_eq!(report.monthly_transaction_summary.len(), 3);

    let cohorts = report.cohorts.ready().expect("cohorts computed");
    assert_eq!(cohorts.labels, vec!["2024-01 (3)", "2024-02 (1)", "2024-03 (2)"]);
    assert_eq!(cohorts.table.retention(cohorts.table.rows[0].cohort_period, 2), Some(33.3));

    let rfm = report.rfm.ready().expect("six customers are enough for RFM");
    assert_eq!(rfm.profiles.len(), 6);
    let segment_total: usize = report.segments.iter().map(|s| s.customers).sum();
    assert_eq!(segment_total, 6);

    let promos = report.breakdowns.promo_code.as_ref().unwrap();
    assert_eq!((promos[0].label.as_str(), promos[0].transactions), ("spring", 2));
}

/// A narrow view with too few customers still yields a report, with RFM
/// marked unavailable and the reason attached.
#[test]
fn narrow_filter_marks_rfm_unavailable() {
    let (records, config) = load();
    let filter = FilterSpec::for_dates(
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        Some("TUN".into()),
    );
    let report = DashboardReport::build(&records, &filter, &config, None).unwrap();

    assert_eq!(report.record_count, 2);
    match &report.rfm {
        Section::Unavailable { reason } => {
            assert!(reason.contains("customers"), "reason explains the shortfall: {reason}")
        }
        Section::Ready { .. } => panic!("two customers cannot be scored"),
    }
    assert!(report.segments.is_empty());
    assert!(report.cohorts.ready().is_some(), "cohorts unaffected");
}

/// The omit policy is carried through from configuration.
#[test]
fn cohort_policy_comes_from_config() {
    let (records, mut config) = load();
    config.degenerate_cohort_policy = DegenerateCohortPolicy::Omit;
    let report = DashboardReport::build(&records, &full_range(), &config, None).unwrap();
    assert!(report.cohorts.ready().unwrap().omitted.is_empty());
}

/// Same input, same output: two builds serialize identically.
#[test]
fn report_is_deterministic() {
    let (records, config) = load();
    let first = DashboardReport::build(&records, &full_range(), &config, None).unwrap();
    let second = DashboardReport::build(&records, &full_range(), &config, None).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

/// The JSON form tags each section with its state.
#[test]
fn json_sections_are_tagged() {
    let (records, config) = load();
    let report = DashboardReport::build(&records, &full_range(), &config, None).unwrap();
    let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    assert_eq!(value["cohorts"]["state"], "ready");
    assert_eq!(value["rfm"]["state"], "ready");
    assert_eq!(value["filter"]["country"], serde_json::Value::Null);
    assert_eq!(value["by_period_channel"][0]["key"], "cash_pickup");
}
