//! Dashboard report: every engine run once over one filtered view.
//!
//! A section that cannot be computed for the current view (no cohort
//! denominator, too few customers for RFM) is reported as `Unavailable`
//! with the reason, and the rest of the report is still produced.

use crate::{
    aggregate::{
        breakdown, by_period_channel, by_period_dimension, by_period_status, kpi_snapshot,
        monthly_customer_stats, monthly_transaction_summary, month_comparison, status_breakdown,
        CategoryCount, Dimension, KpiSnapshot, MonthComparison, MonthlyCustomerStats,
        MonthlyTransactionSummary, PeriodTally, StatusBreakdown,
    },
    cohort::{compute_cohorts_with_policy, CohortAnalysis},
    config::AnalyticsConfig,
    error::{AnalyticsError, AnalyticsResult},
    filter::FilterSpec,
    record::{ChannelBucket, Transaction, TransactionStatus},
    rfm::{compute_rfm, RfmAnalysis, Segment},
};
use chrono::NaiveDateTime;
use serde::Serialize;

/// A computed section, or why it could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Section<T> {
    Ready { value: T },
    Unavailable { reason: String },
}

impl<T> Section<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready { value } => Some(value),
            Section::Unavailable { .. } => None,
        }
    }

    /// Data-dependent failures become `Unavailable`; anything else is
    /// propagated.
    fn from_result(name: &str, result: AnalyticsResult<T>) -> AnalyticsResult<Self> {
        match result {
            Ok(value) => Ok(Section::Ready { value }),
            Err(e @ (AnalyticsError::Computation { .. } | AnalyticsError::InsufficientData { .. })) => {
                log::warn!("{name} unavailable: {e}");
                Ok(Section::Unavailable { reason: e.to_string() })
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeographyTallies {
    pub country:     Option<Vec<PeriodTally<String>>>,
    pub governorate: Option<Vec<PeriodTally<String>>>,
    pub city:        Option<Vec<PeriodTally<String>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdowns {
    pub country:     Option<Vec<CategoryCount>>,
    pub governorate: Option<Vec<CategoryCount>>,
    pub network:     Option<Vec<CategoryCount>>,
    pub reason:      Option<Vec<CategoryCount>>,
    pub promo_code:  Option<Vec<CategoryCount>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentCount {
    pub segment:   Segment,
    pub customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub filter:                      FilterSpec,
    pub record_count:                usize,
    pub kpis:                        Option<KpiSnapshot>,
    pub status_breakdown:            StatusBreakdown,
    pub by_period_channel:           Vec<PeriodTally<ChannelBucket>>,
    pub by_period_status:            Option<Vec<PeriodTally<TransactionStatus>>>,
    pub by_period_geography:         GeographyTallies,
    pub monthly_transaction_summary: Vec<MonthlyTransactionSummary>,
    pub monthly_customer_stats:      Vec<MonthlyCustomerStats>,
    /// City shares for the latest period in view.
    pub latest_month_cities:         Option<MonthComparison>,
    pub breakdowns:                  CategoryBreakdowns,
    pub cohorts:                     Section<CohortAnalysis>,
    pub rfm:                         Section<RfmAnalysis>,
    pub segments:                    Vec<SegmentCount>,
}

impl DashboardReport {
    /// Filter `records` and run every engine over the result.
    pub fn build(
        records: &[Transaction],
        filter: &FilterSpec,
        config: &AnalyticsConfig,
        reference: Option<NaiveDateTime>,
    ) -> AnalyticsResult<Self> {
        let view = filter.apply(records);
        Self::from_view(&view, filter.clone(), config, reference)
    }

    /// Run every engine over an already-filtered view.
    pub fn from_view(
        view: &[Transaction],
        filter: FilterSpec,
        config: &AnalyticsConfig,
        reference: Option<NaiveDateTime>,
    ) -> AnalyticsResult<Self> {
        let cohorts = Section::from_result(
            "cohorts",
            compute_cohorts_with_policy(view, config.degenerate_cohort_policy),
        )?;
        let rfm = Section::from_result("rfm", compute_rfm(view, reference))?;

        let segments = rfm
            .ready()
            .map(|analysis| {
                analysis
                    .segment_counts()
                    .into_iter()
                    .map(|(segment, customers)| SegmentCount { segment, customers })
                    .collect()
            })
            .unwrap_or_default();

        let latest_month_cities = view
            .iter()
            .map(|tx| tx.period)
            .max()
            .map(|period| month_comparison(view, period, config.top_n));

        let report = DashboardReport {
            record_count: view.len(),
            kpis: kpi_snapshot(view),
            status_breakdown: status_breakdown(view),
            by_period_channel: by_period_channel(view),
            by_period_status: by_period_status(view),
            by_period_geography: GeographyTallies {
                country: by_period_dimension(view, Dimension::Country),
                governorate: by_period_dimension(view, Dimension::Governorate),
                city: by_period_dimension(view, Dimension::City),
            },
            monthly_transaction_summary: monthly_transaction_summary(view),
            monthly_customer_stats: monthly_customer_stats(view),
            latest_month_cities,
            breakdowns: CategoryBreakdowns {
                country: breakdown(view, Dimension::Country, None),
                governorate: breakdown(view, Dimension::Governorate, None),
                network: breakdown(view, Dimension::Network, None),
                reason: breakdown(view, Dimension::Reason, None),
                promo_code: breakdown(view, Dimension::PromoCode, None),
            },
            cohorts,
            rfm,
            segments,
            filter,
        };

        log::info!(
            "Report built over {} records (cohorts {}, rfm {})",
            report.record_count,
            if report.cohorts.ready().is_some() { "ready" } else { "unavailable" },
            if report.rfm.ready().is_some() { "ready" } else { "unavailable" },
        );
        Ok(report)
    }

    pub fn to_json(&self) -> AnalyticsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
