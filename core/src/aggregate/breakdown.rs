use super::{period::period_activity, top_n_with_other, PeriodActivity, TallyBuilder, TopNBreakdown};
use crate::{
    normalizer::{normalize_network, normalize_promo_code},
    record::Transaction,
    types::{AmountSum, Period},
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A categorical field a breakdown can group on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Country,
    Governorate,
    City,
    /// Trimmed and title-cased.
    Network,
    Reason,
    /// Trimmed and lower-cased; blank codes are ignored.
    PromoCode,
}

impl Dimension {
    pub fn key(&self, tx: &Transaction) -> Option<String> {
        match self {
            Dimension::Country => tx.country.clone(),
            Dimension::Governorate => tx.governorate.clone(),
            Dimension::City => tx.city.clone(),
            Dimension::Network => tx.network.as_deref().map(normalize_network),
            Dimension::Reason => tx.reason.clone(),
            Dimension::PromoCode => tx.promo_code.as_deref().and_then(normalize_promo_code),
        }
    }

    /// Whether any record carries a value for this dimension.
    pub fn present_in(&self, records: &[Transaction]) -> bool {
        records.iter().any(|tx| self.key(tx).is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub label:            String,
    pub transactions:     usize,
    pub unique_customers: usize,
    pub amount:           AmountSum,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSummary {
    pub country:          String,
    pub city:             String,
    pub transactions:     usize,
    pub active_customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayActivity {
    pub date:             NaiveDate,
    pub transactions:     usize,
    pub active_customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthComparison {
    pub period:       Period,
    /// Transactions per city, top-N plus "Other".
    pub transactions: TopNBreakdown,
    /// Unique customers per city, top-N plus "Other".
    pub customers:    TopNBreakdown,
}

// ── Category breakdowns ──────────────────────────────────────────────────────

/// Counts per category, optionally restricted to one period. Ordered by
/// transactions descending, then label. `None` when no record has the field.
pub fn breakdown(
    records: &[Transaction],
    dimension: Dimension,
    period: Option<Period>,
) -> Option<Vec<CategoryCount>> {
    if !dimension.present_in(records) {
        return None;
    }

    let mut groups: BTreeMap<String, TallyBuilder<'_>> = BTreeMap::new();
    for tx in records {
        if period.is_some_and(|p| tx.period != p) {
            continue;
        }
        if let Some(label) = dimension.key(tx) {
            groups.entry(label).or_default().add(tx);
        }
    }

    let mut counts: Vec<CategoryCount> = groups
        .into_iter()
        .map(|(label, builder)| {
            let tally = builder.finish();
            CategoryCount {
                label,
                transactions: tally.transactions,
                unique_customers: tally.unique_customers,
                amount: tally.amount,
            }
        })
        .collect();
    // Stable sort over label-ordered groups: ties stay alphabetical.
    counts.sort_by(|a, b| b.transactions.cmp(&a.transactions));
    Some(counts)
}

pub fn promo_code_usage(records: &[Transaction]) -> Option<Vec<CategoryCount>> {
    breakdown(records, Dimension::PromoCode, None)
}

/// Distinct periods present, ascending.
pub fn available_periods(records: &[Transaction]) -> Vec<Period> {
    records
        .iter()
        .map(|tx| tx.period)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ── Location views ───────────────────────────────────────────────────────────

/// Distinct governorates, sorted.
pub fn governorates(records: &[Transaction]) -> Vec<String> {
    records
        .iter()
        .filter_map(|tx| tx.governorate.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct cities within a governorate, sorted.
pub fn cities_in(records: &[Transaction], governorate: &str) -> Vec<String> {
    records
        .iter()
        .filter(|tx| tx.governorate.as_deref() == Some(governorate))
        .filter_map(|tx| tx.city.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn in_city<'a>(
    records: &'a [Transaction],
    governorate: &'a str,
    city: &'a str,
) -> impl Iterator<Item = &'a Transaction> + 'a {
    records.iter().filter(move |tx| {
        tx.governorate.as_deref() == Some(governorate) && tx.city.as_deref() == Some(city)
    })
}

/// Monthly transactions and active customers for one city.
pub fn city_timeline(records: &[Transaction], governorate: &str, city: &str) -> Vec<PeriodActivity> {
    let subset: Vec<Transaction> = in_city(records, governorate, city).cloned().collect();
    period_activity(&subset)
}

pub fn city_day_activity(
    records: &[Transaction],
    governorate: &str,
    city: &str,
    date: NaiveDate,
) -> DayActivity {
    let mut transactions = 0;
    let mut customers = BTreeSet::new();
    for tx in in_city(records, governorate, city).filter(|tx| tx.timestamp.date() == date) {
        transactions += 1;
        customers.insert(tx.customer_id.as_str());
    }
    DayActivity { date, transactions, active_customers: customers.len() }
}

/// Withdrawal networks used within one city.
pub fn city_networks(
    records: &[Transaction],
    governorate: &str,
    city: &str,
    period: Option<Period>,
) -> Option<Vec<CategoryCount>> {
    let subset: Vec<Transaction> = in_city(records, governorate, city).cloned().collect();
    breakdown(&subset, Dimension::Network, period)
}

/// Transactions and active customers per (country, city) for one month.
/// Records missing either field are left out.
pub fn location_summary(records: &[Transaction], year: i32, month: u32) -> Vec<LocationSummary> {
    let Some(period) = Period::new(year, month) else {
        return Vec::new();
    };

    let mut groups: BTreeMap<(String, String), TallyBuilder<'_>> = BTreeMap::new();
    for tx in records.iter().filter(|tx| tx.period == period) {
        if let (Some(country), Some(city)) = (&tx.country, &tx.city) {
            groups.entry((country.clone(), city.clone())).or_default().add(tx);
        }
    }

    groups
        .into_iter()
        .map(|((country, city), builder)| {
            let tally = builder.finish();
            LocationSummary {
                country,
                city,
                transactions: tally.transactions,
                active_customers: tally.unique_customers,
            }
        })
        .collect()
}

/// City shares for one month, each metric reduced to `top_n` plus "Other".
pub fn month_comparison(records: &[Transaction], period: Period, top_n: usize) -> MonthComparison {
    let cities = breakdown(records, Dimension::City, Some(period)).unwrap_or_default();
    let transactions: Vec<(String, f64)> = cities
        .iter()
        .map(|c| (c.label.clone(), c.transactions as f64))
        .collect();
    let customers: Vec<(String, f64)> = cities
        .iter()
        .map(|c| (c.label.clone(), c.unique_customers as f64))
        .collect();

    MonthComparison {
        period,
        transactions: top_n_with_other(&transactions, top_n),
        customers: top_n_with_other(&customers, top_n),
    }
}
