//! Index aggregation variant: a small, bounded number of aggregation
//! queries per fetch — a day-bucketed histogram for new subscriptions and
//! one for churn events per constant-offset segment of the window, plus a
//! point-in-time cardinality count. Day bucketing happens index-side with
//! the segment's UTC offset; splitting at DST transitions keeps every
//! event on its true merchant-local day.
//!
//! The query counter exists so the query-count bound stays testable: the
//! count scales with DST transitions in the window (rarely more than one),
//! never with its length in days.

use crate::{
    daily::DayRawCounts,
    error::ChurnResult,
    period::{constant_offset_segments, day_end_exclusive, day_start, Period},
    source::{DailyCountsSource, FetchRequest},
    store::ChurnStore,
};
use chrono::NaiveDate;
use std::cell::Cell;
use std::collections::BTreeMap;

pub struct IndexAggregationSource<'a> {
    store:   &'a ChurnStore,
    queries: Cell<u64>,
}

impl<'a> IndexAggregationSource<'a> {
    pub fn new(store: &'a ChurnStore) -> Self {
        Self {
            store,
            queries: Cell::new(0),
        }
    }

    /// Aggregation queries issued since construction.
    pub fn queries_issued(&self) -> u64 {
        self.queries.get()
    }

    fn count_query(&self) {
        self.queries.set(self.queries.get() + 1);
    }
}

impl DailyCountsSource for IndexAggregationSource<'_> {
    fn day_counts(&self, req: &FetchRequest, period: Period) -> ChurnResult<Vec<DayRawCounts>> {
        let window_start = day_start(period.start_date, req.tz).timestamp();
        let window_end = day_end_exclusive(period.end_date, req.tz).timestamp();

        let mut by_day: BTreeMap<NaiveDate, DayRawCounts> =
            period.days().map(|d| (d, DayRawCounts::empty(d))).collect();

        // One histogram pair per constant-offset segment; the day that
        // contains a transition straddles two segments, so the merge
        // accumulates rather than assigns.
        for segment in constant_offset_segments(req.tz, window_start, window_end) {
            self.count_query();
            let new_histogram = self.store.new_subscription_histogram(
                req.account_id,
                segment.window_start,
                segment.window_end,
                segment.offset_seconds,
                req.product_filter,
            )?;

            self.count_query();
            let churn_histogram = self.store.churn_event_histogram(
                req.account_id,
                segment.window_start,
                segment.window_end,
                segment.offset_seconds,
                req.product_filter,
            )?;

            for (day, count) in new_histogram {
                if let Some(entry) = by_day.get_mut(&day) {
                    entry.new_subscribers += count;
                }
            }
            for (day, count, mrr) in churn_histogram {
                if let Some(entry) = by_day.get_mut(&day) {
                    entry.churned_subscribers += count;
                    entry.churned_mrr_cents += mrr;
                }
            }
        }

        log::debug!(
            "index aggregation: account={} window={}..{} queries={}",
            req.account_id,
            period.start_date,
            period.end_date,
            self.queries.get(),
        );

        Ok(by_day.into_values().collect())
    }

    fn active_on(&self, req: &FetchRequest, date: NaiveDate) -> ChurnResult<i64> {
        self.count_query();
        self.store.active_count_at(
            req.account_id,
            day_start(date, req.tz).timestamp(),
            req.product_filter,
        )
    }
}
