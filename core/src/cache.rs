//! Day-level result caching for large accounts.
//!
//! RULES:
//!   - Only raw per-day counts are cached, never derived churn rates —
//!     rates depend on neighboring days via the running balance and are
//!     re-derived on every read.
//!   - Days inside the freshness horizon (today and yesterday) are always
//!     computed live, never read from or written to the cache.
//!   - Writes are idempotent: racing requests compute the same
//!     deterministic value, so last-write-wins upserts are safe.

use crate::{
    daily::DayRawCounts,
    error::ChurnResult,
    period::Period,
    source::{DailyCountsSource, FetchRequest},
    types::{Cents, ProductId},
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

// ── Cache contract ───────────────────────────────────────────────────────────

/// The raw components of one cached day (pre-running-balance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDayCounts {
    pub new_subscribers:     i64,
    pub churned_subscribers: i64,
    pub churned_mrr_cents:   Cents,
}

impl CachedDayCounts {
    pub fn from_day(day: &DayRawCounts) -> Self {
        Self {
            new_subscribers:     day.new_subscribers,
            churned_subscribers: day.churned_subscribers,
            churned_mrr_cents:   day.churned_mrr_cents,
        }
    }

    pub fn into_day(self, date: NaiveDate) -> DayRawCounts {
        DayRawCounts {
            date,
            new_subscribers:     self.new_subscribers,
            churned_subscribers: self.churned_subscribers,
            churned_mrr_cents:   self.churned_mrr_cents,
        }
    }
}

/// Generic string-keyed day cache: batch reads, single-key upserts.
pub trait CacheStore {
    fn get_many(&self, keys: &[String]) -> ChurnResult<HashMap<String, CachedDayCounts>>;
    fn put(&self, key: &str, day: NaiveDate, counts: &CachedDayCounts) -> ChurnResult<()>;
}

/// In-memory cache store, for tests and embedders without a database.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RefCell<HashMap<String, CachedDayCounts>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }
}

impl CacheStore for MemoryCache {
    fn get_many(&self, keys: &[String]) -> ChurnResult<HashMap<String, CachedDayCounts>> {
        let entries = self.entries.borrow();
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(k).map(|v| (k.clone(), *v)))
            .collect())
    }

    fn put(&self, key: &str, _day: NaiveDate, counts: &CachedDayCounts) -> ChurnResult<()> {
        self.entries.borrow_mut().insert(key.to_string(), *counts);
        Ok(())
    }
}

// ── Keys and configuration ───────────────────────────────────────────────────

/// Cache behavior knobs. `version` participates in every key; bumping it
/// invalidates all entries at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub version:                u32,
    pub freshness_horizon_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version:                1,
            freshness_horizon_days: 2,
        }
    }
}

impl CacheConfig {
    /// Invalidate every cached day by rotating the key namespace.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}

/// Deterministic key for one cached day. The product filter is sorted so
/// equivalent filters share entries.
pub fn cache_key(
    version: u32,
    account_id: &str,
    tz: Tz,
    product_filter: &[ProductId],
    day: NaiveDate,
) -> String {
    let mut products: Vec<&str> = product_filter.iter().map(String::as_str).collect();
    products.sort_unstable();
    format!("churn:v{version}:{account_id}:{tz}:{}:{day}", products.join(","))
}

// ── Read-through source wrapper ──────────────────────────────────────────────

/// Wraps a `DailyCountsSource` with per-day read-through caching.
/// Historical days come from the cache when present; missing days are
/// computed via the inner source for exactly the missing runs and written
/// back.
pub struct CachedSource<'a, S: ?Sized, C: ?Sized> {
    inner:  &'a S,
    cache:  &'a C,
    config: CacheConfig,
    today:  NaiveDate,
}

impl<'a, S, C> CachedSource<'a, S, C>
where
    S: DailyCountsSource + ?Sized,
    C: CacheStore + ?Sized,
{
    pub fn new(inner: &'a S, cache: &'a C, config: CacheConfig, today: NaiveDate) -> Self {
        Self {
            inner,
            cache,
            config,
            today,
        }
    }

    fn cacheable(&self, date: NaiveDate) -> bool {
        (self.today - date).num_days() >= self.config.freshness_horizon_days
    }

    fn key_for(&self, req: &FetchRequest, day: NaiveDate) -> String {
        cache_key(
            self.config.version,
            req.account_id,
            req.tz,
            req.product_filter,
            day,
        )
    }
}

/// Group sorted days into maximal contiguous runs.
fn contiguous_runs(days: &[NaiveDate]) -> Vec<Period> {
    let mut runs = Vec::new();
    let mut iter = days.iter().copied();
    let Some(first) = iter.next() else {
        return runs;
    };

    let mut start = first;
    let mut end = first;
    for day in iter {
        if (day - end).num_days() == 1 {
            end = day;
        } else {
            runs.push(Period::new(start, end));
            start = day;
            end = day;
        }
    }
    runs.push(Period::new(start, end));
    runs
}

impl<S, C> DailyCountsSource for CachedSource<'_, S, C>
where
    S: DailyCountsSource + ?Sized,
    C: CacheStore + ?Sized,
{
    fn day_counts(&self, req: &FetchRequest, period: Period) -> ChurnResult<Vec<DayRawCounts>> {
        let mut resolved: BTreeMap<NaiveDate, DayRawCounts> = BTreeMap::new();

        let cacheable_days: Vec<NaiveDate> =
            period.days().filter(|d| self.cacheable(*d)).collect();
        let live_days: Vec<NaiveDate> =
            period.days().filter(|d| !self.cacheable(*d)).collect();

        let keys: Vec<String> = cacheable_days
            .iter()
            .map(|d| self.key_for(req, *d))
            .collect();
        let found = self.cache.get_many(&keys)?;

        let mut missing = Vec::new();
        for (day, key) in cacheable_days.iter().zip(&keys) {
            match found.get(key) {
                Some(counts) => {
                    resolved.insert(*day, counts.into_day(*day));
                }
                None => missing.push(*day),
            }
        }

        log::debug!(
            "cache read: account={} period={}..{} hit={} miss={} live={}",
            req.account_id,
            period.start_date,
            period.end_date,
            resolved.len(),
            missing.len(),
            live_days.len(),
        );

        // Fill cache misses from the inner source, then write them back.
        for run in contiguous_runs(&missing) {
            for day in self.inner.day_counts(req, run)? {
                self.cache.put(
                    &self.key_for(req, day.date),
                    day.date,
                    &CachedDayCounts::from_day(&day),
                )?;
                resolved.insert(day.date, day);
            }
        }

        // Fresh days are always live and never written back.
        for run in contiguous_runs(&live_days) {
            for day in self.inner.day_counts(req, run)? {
                resolved.insert(day.date, day);
            }
        }

        Ok(resolved.into_values().collect())
    }

    fn active_on(&self, req: &FetchRequest, date: NaiveDate) -> ChurnResult<i64> {
        // The point-in-time balance seeds the running-balance walk and is
        // always computed live.
        self.inner.active_on(req, date)
    }
}
