use super::StatusSplit;
use crate::{
    record::{ChannelBucket, Transaction, TransactionStatus},
    types::{AmountSum, CustomerId, Period},
};
use chrono::{Months, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Transactions, distinct customers and amounts, each split by status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusBreakdown {
    pub transactions: StatusSplit<usize>,
    /// A customer with transactions in several statuses counts in each.
    pub customers:    StatusSplit<usize>,
    pub amounts:      StatusSplit<AmountSum>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiggestTransaction {
    pub customer_id: CustomerId,
    pub timestamp:   NaiveDateTime,
    pub amount:      f64,
    pub status:      Option<TransactionStatus>,
}

/// Headline figures for one window of the filtered data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiWindow {
    pub start:           NaiveDateTime,
    pub breakdown:       StatusBreakdown,
    /// Customers whose first transaction in the data falls in this window.
    /// One with window transactions in several statuses counts in each.
    pub new_customers:   StatusSplit<usize>,
    pub biggest:         Option<BiggestTransaction>,
    pub dominant_status: Option<TransactionStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date:                NaiveDate,
    pub kpis:                KpiWindow,
    pub active_customers:    usize,
    pub cash_pickup:         StatusSplit<usize>,
    pub bank_transfer:       StatusSplit<usize>,
    /// New customers counted once each, under the status of their first
    /// transaction.
    pub new_by_first_status: StatusSplit<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSnapshot {
    /// Latest calendar day present in the data.
    pub latest_day: NaiveDate,
    pub today:      KpiWindow,
    /// From the first of `latest_day`'s month onwards.
    pub this_month: KpiWindow,
}

pub fn status_breakdown(records: &[Transaction]) -> StatusBreakdown {
    breakdown_of(records.iter())
}

fn breakdown_of<'a>(records: impl IntoIterator<Item = &'a Transaction>) -> StatusBreakdown {
    let mut transactions = StatusSplit::default();
    let mut customers: StatusSplit<BTreeSet<&str>> = StatusSplit::default();
    let mut amounts: StatusSplit<AmountSum> = StatusSplit::default();

    for tx in records {
        let status = tx.status.as_ref();
        let id = tx.customer_id.as_str();
        transactions.count(status);

        customers.total.insert(id);
        if let Some(set) = customers.slot_mut(status) {
            set.insert(id);
        }

        amounts.total.add(tx.amount);
        if let Some(sum) = amounts.slot_mut(status) {
            sum.add(tx.amount);
        }
    }

    StatusBreakdown {
        transactions,
        customers: customers.map(|set| set.len()),
        amounts,
    }
}

/// Most common status; ties go to the status whose name sorts first.
pub fn dominant_status<'a, I>(statuses: I) -> Option<TransactionStatus>
where
    I: IntoIterator<Item = &'a TransactionStatus>,
{
    let mut counts: BTreeMap<&str, (usize, &TransactionStatus)> = BTreeMap::new();
    for s in statuses {
        counts.entry(s.as_str()).or_insert((0, s)).0 += 1;
    }

    let mut best: Option<(usize, &TransactionStatus)> = None;
    for (count, status) in counts.into_values() {
        if best.is_none_or(|(n, _)| count > n) {
            best = Some((count, status));
        }
    }
    best.map(|(_, s)| s.clone())
}

/// "Today" and "this month" figures, anchored on the latest transaction.
/// `None` for an empty record set.
pub fn kpi_snapshot(records: &[Transaction]) -> Option<KpiSnapshot> {
    let latest = records.iter().map(|tx| tx.timestamp).max()?;
    let latest_day = latest.date();
    let month_start = Period::of(&latest).first_day();

    let first_seen = first_transactions(records);
    Some(KpiSnapshot {
        latest_day,
        today: window(records, &first_seen, latest_day, latest_day.succ_opt()?)?,
        this_month: window(records, &first_seen, month_start, next_month(month_start)?)?,
    })
}

/// Figures for one calendar day, latest or not. `None` only when the day
/// is the last one chrono can represent.
pub fn day_window(records: &[Transaction], date: NaiveDate) -> Option<KpiWindow> {
    window(records, &first_transactions(records), date, date.succ_opt()?)
}

/// The "select a day" drill-down: the day's KPI window plus its channel
/// split and how many customers made their first-ever transaction on it.
pub fn day_summary(records: &[Transaction], date: NaiveDate) -> Option<DaySummary> {
    let first_seen = first_transactions(records);
    let kpis = window(records, &first_seen, date, date.succ_opt()?)?;

    let mut cash_pickup = StatusSplit::default();
    let mut bank_transfer = StatusSplit::default();
    for tx in records.iter().filter(|tx| tx.timestamp.date() == date) {
        let status = tx.status.as_ref();
        match tx.channel {
            ChannelBucket::CashPickup => cash_pickup.count(status),
            ChannelBucket::BankTransfer => bank_transfer.count(status),
            ChannelBucket::Other => {}
        }
    }

    let mut new_by_first_status = StatusSplit::default();
    for first in first_seen.values().filter(|tx| tx.timestamp.date() == date) {
        new_by_first_status.count(first.status.as_ref());
    }

    Some(DaySummary {
        date,
        active_customers: kpis.breakdown.customers.total,
        kpis,
        cash_pickup,
        bank_transfer,
        new_by_first_status,
    })
}

/// Each customer's earliest transaction; input order breaks timestamp ties.
fn first_transactions(records: &[Transaction]) -> BTreeMap<&str, &Transaction> {
    let mut first_seen: BTreeMap<&str, &Transaction> = BTreeMap::new();
    for tx in records {
        first_seen
            .entry(tx.customer_id.as_str())
            .and_modify(|first| {
                if tx.timestamp < first.timestamp {
                    *first = tx;
                }
            })
            .or_insert(tx);
    }
    first_seen
}

/// Records dated within `[from, until)`.
fn window(
    records: &[Transaction],
    first_seen: &BTreeMap<&str, &Transaction>,
    from: NaiveDate,
    until: NaiveDate,
) -> Option<KpiWindow> {
    let start = from.and_hms_opt(0, 0, 0)?;
    let end = until.and_hms_opt(0, 0, 0)?;
    let in_window = |tx: &Transaction| tx.timestamp >= start && tx.timestamp < end;

    let subset: Vec<&Transaction> = records.iter().filter(|tx| in_window(*tx)).collect();
    let new_ids: BTreeSet<&str> = first_seen
        .iter()
        .filter(|(_, first)| in_window(**first))
        .map(|(id, _)| *id)
        .collect();
    let new_customers = breakdown_of(
        subset
            .iter()
            .copied()
            .filter(|tx| new_ids.contains(tx.customer_id.as_str())),
    )
    .customers;

    Some(KpiWindow {
        start,
        breakdown: breakdown_of(subset.iter().copied()),
        new_customers,
        biggest: biggest_transaction(&subset),
        dominant_status: dominant_status(subset.iter().filter_map(|tx| tx.status.as_ref())),
    })
}

fn next_month(first_day: NaiveDate) -> Option<NaiveDate> {
    first_day.checked_add_months(Months::new(1))
}

/// Largest amount; the earliest record in input order wins a tie.
fn biggest_transaction(records: &[&Transaction]) -> Option<BiggestTransaction> {
    let mut best: Option<(&Transaction, f64)> = None;
    for &tx in records {
        if let Some(amount) = tx.amount {
            if best.is_none_or(|(_, a)| amount > a) {
                best = Some((tx, amount));
            }
        }
    }
    best.map(|(tx, amount)| BiggestTransaction {
        customer_id: tx.customer_id.clone(),
        timestamp: tx.timestamp,
        amount,
        status: tx.status.clone(),
    })
}
