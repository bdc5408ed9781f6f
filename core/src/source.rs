//! Data-retrieval seam — two interchangeable strategies behind one trait.
//!
//! RULES:
//!   - Both variants must yield identical `RawSeries` for the same data;
//!     the contract suite in `tests/data_sources.rs` holds them to it.
//!   - Grouped, whole-range retrieval only. Never one query per day.

mod index;
mod relational;

pub use index::IndexAggregationSource;
pub use relational::RelationalScanSource;

use crate::{
    daily::{DayRawCounts, RawSeries},
    error::ChurnResult,
    period::Period,
    types::ProductId,
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Which retrieval strategy a service instance uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    RelationalScan,
    IndexAggregation,
}

/// Everything a source needs besides the date range. An empty
/// `product_filter` means all of the merchant's products.
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub account_id:     &'a str,
    pub tz:             Tz,
    pub product_filter: &'a [ProductId],
}

pub trait DailyCountsSource {
    /// Raw per-day counts for every day of `period`, in chronological
    /// order, one entry per day (zero-filled where nothing happened).
    fn day_counts(&self, req: &FetchRequest, period: Period) -> ChurnResult<Vec<DayRawCounts>>;

    /// Point-in-time count of subscriptions active at the first instant
    /// of `date`.
    fn active_on(&self, req: &FetchRequest, date: NaiveDate) -> ChurnResult<i64>;

    /// The full fetch: day-1 active count plus the per-day series.
    fn fetch_daily_raw_counts(&self, req: &FetchRequest, period: Period) -> ChurnResult<RawSeries> {
        Ok(RawSeries {
            active_at_start: self.active_on(req, period.start_date)?,
            days:            self.day_counts(req, period)?,
        })
    }
}
