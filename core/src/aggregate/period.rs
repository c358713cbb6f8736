use super::{breakdown::Dimension, dominant_status, has_status, StatusSplit, Tally, TallyBuilder};
use crate::{
    record::{ChannelBucket, Transaction, TransactionStatus},
    types::Period,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodTally<K> {
    pub period: Period,
    pub key:    K,
    pub tally:  Tally,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodActivity {
    pub period:           Period,
    pub transactions:     usize,
    pub active_customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTransactionSummary {
    pub period:        Period,
    pub transactions:  StatusSplit<usize>,
    pub cash_pickup:   StatusSplit<usize>,
    pub bank_transfer: StatusSplit<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCustomerStats {
    pub period:           Period,
    /// "May 2024"
    pub label:            String,
    pub active_customers: usize,
    /// Distinct customers whose paid-transaction count is 1. `None` when
    /// the source has no paid-transaction-count column.
    pub new_customers:    Option<usize>,
    /// Customers counted once each, under their most common status that
    /// month.
    pub dominant_status:  StatusSplit<usize>,
}

/// Group by (period, key) and tally. Records for which `key` yields `None`
/// are left out. Output is ordered by period, then key.
pub fn tally_by_period<'a, K, F>(records: &'a [Transaction], key: F) -> Vec<PeriodTally<K>>
where
    K: Ord + Clone,
    F: Fn(&'a Transaction) -> Option<K>,
{
    let mut groups: BTreeMap<(Period, K), TallyBuilder<'a>> = BTreeMap::new();
    for tx in records {
        if let Some(k) = key(tx) {
            groups.entry((tx.period, k)).or_default().add(tx);
        }
    }
    groups
        .into_iter()
        .map(|((period, key), builder)| PeriodTally { period, key, tally: builder.finish() })
        .collect()
}

pub fn by_period_channel(records: &[Transaction]) -> Vec<PeriodTally<ChannelBucket>> {
    tally_by_period(records, |tx| Some(tx.channel))
}

/// Both cancel spellings already share one `Cancelled` key.
pub fn by_period_status(records: &[Transaction]) -> Option<Vec<PeriodTally<TransactionStatus>>> {
    has_status(records).then(|| tally_by_period(records, |tx| tx.status.clone()))
}

/// Geography (country, governorate, city) or any other dimension per period.
pub fn by_period_dimension(
    records: &[Transaction],
    dimension: Dimension,
) -> Option<Vec<PeriodTally<String>>> {
    dimension
        .present_in(records)
        .then(|| tally_by_period(records, |tx| dimension.key(tx)))
}

pub fn period_activity(records: &[Transaction]) -> Vec<PeriodActivity> {
    tally_by_period(records, |_| Some(()))
        .into_iter()
        .map(|t| PeriodActivity {
            period: t.period,
            transactions: t.tally.transactions,
            active_customers: t.tally.unique_customers,
        })
        .collect()
}

/// Per period: transactions by status, and cash-pickup / bank-transfer
/// transactions by status.
pub fn monthly_transaction_summary(records: &[Transaction]) -> Vec<MonthlyTransactionSummary> {
    let mut months: BTreeMap<Period, MonthlyTransactionSummary> = BTreeMap::new();
    for tx in records {
        let summary = months.entry(tx.period).or_insert_with(|| MonthlyTransactionSummary {
            period: tx.period,
            transactions: StatusSplit::default(),
            cash_pickup: StatusSplit::default(),
            bank_transfer: StatusSplit::default(),
        });
        let status = tx.status.as_ref();
        summary.transactions.count(status);
        match tx.channel {
            ChannelBucket::CashPickup => summary.cash_pickup.count(status),
            ChannelBucket::BankTransfer => summary.bank_transfer.count(status),
            ChannelBucket::Other => {}
        }
    }
    months.into_values().collect()
}

pub fn monthly_customer_stats(records: &[Transaction]) -> Vec<MonthlyCustomerStats> {
    let tracks_paid_count = records.iter().any(|tx| tx.paid_transaction_count.is_some());

    let mut by_month: BTreeMap<Period, Vec<&Transaction>> = BTreeMap::new();
    for tx in records {
        by_month.entry(tx.period).or_default().push(tx);
    }

    by_month
        .into_iter()
        .map(|(period, txs)| {
            let mut statuses: BTreeMap<&str, Vec<&TransactionStatus>> = BTreeMap::new();
            let mut new_customers = BTreeSet::new();
            for tx in &txs {
                let entry = statuses.entry(tx.customer_id.as_str()).or_default();
                if let Some(s) = &tx.status {
                    entry.push(s);
                }
                if tx.paid_transaction_count == Some(1) {
                    new_customers.insert(tx.customer_id.as_str());
                }
            }

            let mut dominant = StatusSplit::default();
            for customer_statuses in statuses.values() {
                let mode = dominant_status(customer_statuses.iter().copied());
                dominant.count(mode.as_ref());
            }

            MonthlyCustomerStats {
                period,
                label: period.month_year_label(),
                active_customers: statuses.len(),
                new_customers: tracks_paid_count.then_some(new_customers.len()),
                dominant_status: dominant,
            }
        })
        .collect()
}
