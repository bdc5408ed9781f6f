//! Daily series construction — one bucket per calendar day, with a running
//! active balance carried across the period.
//!
//! Each day's rate reflects the dynamics since period start: day `d`'s
//! active-at-start is the day-1 point-in-time count plus all intervening
//! new subscriptions minus all intervening churns, never a fresh
//! point-in-time recount. Period totals are reconstructed from the bucket
//! sequence, so the per-day decomposition and the period aggregate always
//! reconcile exactly.

use crate::{aggregate::{churn_rate, PeriodTotals}, types::Cents};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw per-day counts as produced by a data source (pre-running-balance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRawCounts {
    pub date:                NaiveDate,
    pub new_subscribers:     i64,
    pub churned_subscribers: i64,
    pub churned_mrr_cents:   Cents,
}

impl DayRawCounts {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            new_subscribers: 0,
            churned_subscribers: 0,
            churned_mrr_cents: 0,
        }
    }
}

/// A full fetch result: the day-1 active count plus one raw entry per day
/// of the period, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSeries {
    pub active_at_start: i64,
    pub days:            Vec<DayRawCounts>,
}

/// One fully derived day of the report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date:                NaiveDate,
    pub active_at_start:     i64,
    pub new_subscribers:     i64,
    pub churned_subscribers: i64,
    pub churned_mrr_cents:   Cents,
    pub customer_churn_rate: f64,
}

/// Walk the days chronologically, deriving each day's rate from the
/// running balance. A day with an empty base has rate 0, never a
/// division error.
pub fn build_daily_series(raw: &RawSeries) -> Vec<DailyBucket> {
    let mut running_active = raw.active_at_start;
    let mut buckets = Vec::with_capacity(raw.days.len());

    for day in &raw.days {
        buckets.push(DailyBucket {
            date:                day.date,
            active_at_start:     running_active,
            new_subscribers:     day.new_subscribers,
            churned_subscribers: day.churned_subscribers,
            churned_mrr_cents:   day.churned_mrr_cents,
            customer_churn_rate: churn_rate(
                running_active,
                day.new_subscribers,
                day.churned_subscribers,
            ),
        });

        running_active += day.new_subscribers - day.churned_subscribers;
    }

    buckets
}

/// Period totals reconstructed from the daily decomposition:
/// day-1 active count plus summed new/churned/MRR across the days.
pub fn period_totals(buckets: &[DailyBucket]) -> PeriodTotals {
    let mut totals = PeriodTotals {
        active_at_start: buckets.first().map_or(0, |b| b.active_at_start),
        ..PeriodTotals::default()
    };

    for bucket in buckets {
        totals.new_subscribers += bucket.new_subscribers;
        totals.churned_subscribers += bucket.churned_subscribers;
        totals.churned_mrr_cents += bucket.churned_mrr_cents;
    }

    totals
}
