//! Relational scan variant: one overlap query loads every candidate row,
//! then the classifier predicates run in memory per day. Cost scales with
//! subscriber count, not range length — fine for small-to-medium accounts.

use crate::{
    classifier,
    daily::{DayRawCounts, RawSeries},
    error::ChurnResult,
    period::{day_end_exclusive, day_start, local_date, Period},
    source::{DailyCountsSource, FetchRequest},
    store::ChurnStore,
};
use chrono::NaiveDate;

pub struct RelationalScanSource<'a> {
    store: &'a ChurnStore,
}

impl<'a> RelationalScanSource<'a> {
    pub fn new(store: &'a ChurnStore) -> Self {
        Self { store }
    }

    fn load(
        &self,
        req: &FetchRequest,
        period: Period,
    ) -> ChurnResult<Vec<classifier::Subscription>> {
        self.store.load_overlapping_subscriptions(
            req.account_id,
            day_start(period.start_date, req.tz).timestamp(),
            day_end_exclusive(period.end_date, req.tz).timestamp(),
            req.product_filter,
        )
    }

    /// Bucket creations and deactivations by merchant-local calendar day.
    fn bucket_days(
        subs: &[classifier::Subscription],
        req: &FetchRequest,
        period: Period,
    ) -> Vec<DayRawCounts> {
        let mut days: Vec<DayRawCounts> = period.days().map(DayRawCounts::empty).collect();
        let index_of = |date: NaiveDate| -> Option<usize> {
            if date < period.start_date || date > period.end_date {
                return None;
            }
            Some((date - period.start_date).num_days() as usize)
        };

        for sub in subs {
            if let Some(i) = index_of(local_date(sub.created_at, req.tz)) {
                days[i].new_subscribers += 1;
            }
            if let Some(ended) = sub.deactivated_at {
                if let Some(i) = index_of(local_date(ended, req.tz)) {
                    days[i].churned_subscribers += 1;
                    days[i].churned_mrr_cents += classifier::monthly_recurring_revenue(sub);
                }
            }
        }

        days
    }
}

impl DailyCountsSource for RelationalScanSource<'_> {
    fn day_counts(&self, req: &FetchRequest, period: Period) -> ChurnResult<Vec<DayRawCounts>> {
        let subs = self.load(req, period)?;
        Ok(Self::bucket_days(&subs, req, period))
    }

    fn active_on(&self, req: &FetchRequest, date: NaiveDate) -> ChurnResult<i64> {
        let subs = self.load(req, Period::new(date, date))?;
        Ok(subs
            .iter()
            .filter(|sub| classifier::active_at_start(sub, date, req.tz))
            .count() as i64)
    }

    /// Single-load override: one overlap query serves both the day-1
    /// active count and the per-day buckets.
    fn fetch_daily_raw_counts(&self, req: &FetchRequest, period: Period) -> ChurnResult<RawSeries> {
        let subs = self.load(req, period)?;

        let active_at_start = subs
            .iter()
            .filter(|sub| classifier::active_at_start(sub, period.start_date, req.tz))
            .count() as i64;

        log::debug!(
            "relational scan: account={} window={}..{} rows={}",
            req.account_id,
            period.start_date,
            period.end_date,
            subs.len(),
        );

        Ok(RawSeries {
            active_at_start,
            days: Self::bucket_days(&subs, req, period),
        })
    }
}
