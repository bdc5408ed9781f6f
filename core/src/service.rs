//! The churn report service — wires normalization, data sources, caching,
//! and the series builder into the final result document.
//!
//! EXECUTION ORDER (fixed):
//!   1. Resolve account (timezone, large-seller flag).
//!   2. Normalize the date range; apply the caller's range policy.
//!   3. Resolve the effective product filter; empty set short-circuits
//!      to `None` (an expected state, not an error).
//!   4. Fetch raw per-day counts for the period and its predecessor
//!      (read-through cached for large sellers).
//!   5. Build the daily series and period metrics, render the document.
//!
//! Data-source failures propagate unchanged; there are no partial results.

use crate::{
    aggregate::PeriodMetrics,
    cache::CachedSource,
    config::ReportConfig,
    daily::{build_daily_series, period_totals, DailyBucket},
    error::{ChurnError, ChurnResult},
    period::{self, parse_timezone, resolve_period, Period, RangeParams, DATE_FORMAT},
    source::{
        DailyCountsSource, FetchRequest, IndexAggregationSource, RelationalScanSource, SourceKind,
    },
    store::ChurnStore,
    types::{AccountId, Cents, ProductId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Request / response types ─────────────────────────────────────────────────

/// What to do when the normalized range is backwards (`end < start`).
/// An explicit per-entry-point choice, never an ambient default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePolicy {
    /// Raise `InvalidDateRange`.
    Strict,
    /// Return `Ok(None)` — "nothing to show".
    Lenient,
}

#[derive(Debug, Clone, Default)]
pub struct ChurnQuery {
    pub account_id:  AccountId,
    pub range:       RangeParams,
    /// Product allow-list; `None` means all of the merchant's live products.
    pub product_ids: Option<Vec<ProductId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEntry {
    pub date:                String,
    pub month:               String,
    pub month_index:         i32,
    pub customer_churn_rate: f64,
    pub churned_subscribers: i64,
    pub churned_mrr_cents:   Cents,
    pub active_at_start:     i64,
    pub new_subscribers:     i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnReport {
    pub start_date: String,
    pub end_date:   String,
    pub metrics:    PeriodMetrics,
    pub daily_data: Vec<DailyEntry>,
}

// ── Service ──────────────────────────────────────────────────────────────────

pub struct ChurnService<'a> {
    store:  &'a ChurnStore,
    config: ReportConfig,
}

impl<'a> ChurnService<'a> {
    pub fn new(store: &'a ChurnStore, config: ReportConfig) -> Self {
        Self { store, config }
    }

    /// Compute the churn report for one account and date range.
    ///
    /// Returns `Ok(None)` when the account has no eligible subscription
    /// products (or none matching the filter), or — under
    /// `RangePolicy::Lenient` — when the range is backwards.
    pub fn fetch_churn_data(
        &self,
        query: &ChurnQuery,
        policy: RangePolicy,
        now: DateTime<Utc>,
    ) -> ChurnResult<Option<ChurnReport>> {
        let account = self
            .store
            .get_account(&query.account_id)?
            .ok_or_else(|| ChurnError::AccountNotFound {
                account_id: query.account_id.clone(),
            })?;
        let tz = parse_timezone(&account.timezone)?;
        let today = period::local_date(now, tz);

        let period = resolve_period(&query.range, today)?;
        if !period.is_valid() {
            match policy {
                RangePolicy::Strict => {
                    return Err(ChurnError::InvalidDateRange {
                        start: period.start_date,
                        end:   period.end_date,
                    })
                }
                RangePolicy::Lenient => {
                    log::info!(
                        "churn: backwards range {}..{} for {} — returning nothing",
                        period.start_date,
                        period.end_date,
                        query.account_id,
                    );
                    return Ok(None);
                }
            }
        }

        let Some(product_filter) = self.effective_products(query)? else {
            return Ok(None);
        };

        let req = FetchRequest {
            account_id:     &query.account_id,
            tz,
            product_filter: &product_filter,
        };

        // Source selection, optionally wrapped with the day cache.
        let relational;
        let index;
        let inner: &dyn DailyCountsSource = match self.config.source {
            SourceKind::RelationalScan => {
                relational = RelationalScanSource::new(self.store);
                &relational
            }
            SourceKind::IndexAggregation => {
                index = IndexAggregationSource::new(self.store);
                &index
            }
        };

        let cached;
        let source: &dyn DailyCountsSource = if account.large_seller {
            cached = CachedSource::new(inner, self.store, self.config.cache, today);
            &cached
        } else {
            inner
        };

        let raw = source.fetch_daily_raw_counts(&req, period)?;
        let buckets = build_daily_series(&raw);
        let totals = period_totals(&buckets);

        let previous = period.previous();
        let previous_raw = source.fetch_daily_raw_counts(&req, previous)?;
        let previous_rate = period_totals(&build_daily_series(&previous_raw)).churn_rate();

        let metrics = PeriodMetrics {
            customer_churn_rate:    totals.churn_rate(),
            last_period_churn_rate: previous_rate,
            churned_subscribers:    totals.churned_subscribers,
            churned_mrr_cents:      totals.churned_mrr_cents,
        };

        log::debug!(
            "churn: account={} period={}..{} rate={} churned={}",
            query.account_id,
            period.start_date,
            period.end_date,
            metrics.customer_churn_rate,
            metrics.churned_subscribers,
        );

        Ok(Some(render_report(period, metrics, &buckets)))
    }

    /// Intersect the requested product filter with the account's live
    /// products. `Ok(None)` means nothing is eligible.
    fn effective_products(&self, query: &ChurnQuery) -> ChurnResult<Option<Vec<ProductId>>> {
        let live = self.store.live_product_ids(&query.account_id)?;
        if live.is_empty() {
            log::info!("churn: {} has no live subscription products", query.account_id);
            return Ok(None);
        }

        match &query.product_ids {
            None => Ok(Some(live)),
            Some(requested) => {
                let selected: Vec<ProductId> = live
                    .into_iter()
                    .filter(|p| requested.contains(p))
                    .collect();
                if selected.is_empty() {
                    return Ok(None);
                }
                Ok(Some(selected))
            }
        }
    }
}

fn render_report(period: Period, metrics: PeriodMetrics, buckets: &[DailyBucket]) -> ChurnReport {
    let daily_data = buckets
        .iter()
        .map(|b| DailyEntry {
            date:                b.date.format(DATE_FORMAT).to_string(),
            month:               period::month_label(b.date),
            month_index:         period::month_index(period.start_date, b.date),
            customer_churn_rate: b.customer_churn_rate,
            churned_subscribers: b.churned_subscribers,
            churned_mrr_cents:   b.churned_mrr_cents,
            active_at_start:     b.active_at_start,
            new_subscribers:     b.new_subscribers,
        })
        .collect();

    ChurnReport {
        start_date: period.start_date.format(DATE_FORMAT).to_string(),
        end_date: period.end_date.format(DATE_FORMAT).to_string(),
        metrics,
        daily_data,
    }
}
