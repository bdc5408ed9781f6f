//! Period-level aggregation and the churn-rate formula.
//!
//! The rate follows Stripe's definition: churned customers divided by the
//! base that existed *and* could have churned during the window —
//! pre-existing plus newly acquired, not pre-existing alone.

use crate::{
    classifier::{self, Subscription},
    period::Period,
    types::Cents,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Raw counts for one period (or one day).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub active_at_start:     i64,
    pub new_subscribers:     i64,
    pub churned_subscribers: i64,
    pub churned_mrr_cents:   Cents,
}

impl PeriodTotals {
    /// Denominator of the churn formula: active-at-start + new.
    pub fn total_base(&self) -> i64 {
        self.active_at_start + self.new_subscribers
    }

    pub fn churn_rate(&self) -> f64 {
        churn_rate(self.active_at_start, self.new_subscribers, self.churned_subscribers)
    }
}

/// Final period-level metrics of the result document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodMetrics {
    pub customer_churn_rate:    f64,
    pub last_period_churn_rate: f64,
    pub churned_subscribers:    i64,
    pub churned_mrr_cents:      Cents,
}

/// Round to two decimal places (half away from zero).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `churned / (active_at_start + new) * 100`, 2 decimals; 0.0 on an empty base.
pub fn churn_rate(active_at_start: i64, new_subscribers: i64, churned_subscribers: i64) -> f64 {
    let total_base = active_at_start + new_subscribers;
    if total_base == 0 {
        return 0.0;
    }
    round2(churned_subscribers as f64 / total_base as f64 * 100.0)
}

/// Fold classified subscriptions into period totals.
pub fn aggregate_period(subs: &[Subscription], period: Period, tz: Tz) -> PeriodTotals {
    let mut totals = PeriodTotals::default();

    for sub in subs {
        if classifier::active_at_start(sub, period.start_date, tz) {
            totals.active_at_start += 1;
        }
        if classifier::new_during(sub, period.start_date, period.end_date, tz) {
            totals.new_subscribers += 1;
        }
        if classifier::churned_during(sub, period.start_date, period.end_date, tz) {
            totals.churned_subscribers += 1;
            totals.churned_mrr_cents += classifier::monthly_recurring_revenue(sub);
        }
    }

    totals
}
