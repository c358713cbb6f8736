//! Aggregation engine: period-bucketed and category-bucketed tallies.
//!
//! Every function here is a pure fold over `&[Transaction]`. Status and
//! channel values were normalized once by the row normalizer; network and
//! promo-code spellings are normalized through the same helpers.
//!
//! A breakdown over an optional field returns `None` when no record carries
//! that field, so callers can skip it instead of showing an empty table.

mod breakdown;
mod kpi;
mod period;
mod top_n;

pub use breakdown::{
    available_periods, breakdown, cities_in, city_day_activity, city_networks, city_timeline,
    governorates, location_summary, month_comparison, promo_code_usage, CategoryCount,
    DayActivity, Dimension, LocationSummary, MonthComparison,
};
pub use kpi::{
    day_summary, day_window, dominant_status, kpi_snapshot, status_breakdown, BiggestTransaction,
    DaySummary, KpiSnapshot, KpiWindow, StatusBreakdown,
};
pub use period::{
    by_period_channel, by_period_dimension, by_period_status, monthly_customer_stats,
    monthly_transaction_summary, period_activity, tally_by_period, MonthlyCustomerStats,
    MonthlyTransactionSummary, PeriodActivity, PeriodTally,
};
pub use top_n::{top_n_with_other, ShareRow, TopNBreakdown, OTHER_LABEL};

use crate::{
    record::{Transaction, TransactionStatus},
    types::AmountSum,
};
use serde::Serialize;
use std::collections::BTreeSet;

// ── Shared tallies ───────────────────────────────────────────────────────────

/// Transactions, distinct customers and amount total for one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tally {
    pub transactions:     usize,
    pub unique_customers: usize,
    pub amount:           AmountSum,
}

#[derive(Debug, Default)]
struct TallyBuilder<'a> {
    transactions: usize,
    customers:    BTreeSet<&'a str>,
    amount:       AmountSum,
}

impl<'a> TallyBuilder<'a> {
    fn add(&mut self, tx: &'a Transaction) {
        self.transactions += 1;
        self.customers.insert(tx.customer_id.as_str());
        self.amount.add(tx.amount);
    }

    fn finish(self) -> Tally {
        Tally {
            transactions: self.transactions,
            unique_customers: self.customers.len(),
            amount: self.amount,
        }
    }
}

/// A value split by normalized status. `total` covers every record,
/// including those with no status; `other` collects unrecognised statuses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSplit<T> {
    pub total:       T,
    pub complete:    T,
    pub in_progress: T,
    pub cancelled:   T,
    pub other:       T,
}

impl<T> StatusSplit<T> {
    /// The bucket a status falls into; `None` for records without a status.
    pub fn slot_mut(&mut self, status: Option<&TransactionStatus>) -> Option<&mut T> {
        match status? {
            TransactionStatus::Complete => Some(&mut self.complete),
            TransactionStatus::InProgress => Some(&mut self.in_progress),
            TransactionStatus::Cancelled => Some(&mut self.cancelled),
            TransactionStatus::Other(_) => Some(&mut self.other),
        }
    }

    pub fn map<U>(self, f: impl Fn(T) -> U) -> StatusSplit<U> {
        StatusSplit {
            total: f(self.total),
            complete: f(self.complete),
            in_progress: f(self.in_progress),
            cancelled: f(self.cancelled),
            other: f(self.other),
        }
    }
}

impl StatusSplit<usize> {
    fn count(&mut self, status: Option<&TransactionStatus>) {
        self.total += 1;
        if let Some(slot) = self.slot_mut(status) {
            *slot += 1;
        }
    }
}

/// True when at least one record carries a status.
fn has_status(records: &[Transaction]) -> bool {
    records.iter().any(|tx| tx.status.is_some())
}
