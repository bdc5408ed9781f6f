use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use churnmetrics_core::{
    classifier::{RecurrenceUnit, Subscription},
    period::Period,
    source::{DailyCountsSource, FetchRequest, IndexAggregationSource, RelationalScanSource},
    store::ChurnStore,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn ts(raw: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .unwrap()
        .and_utc()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn sub(
    id: &str,
    product: &str,
    created: &str,
    deactivated: Option<&str>,
    cents: i64,
    unit: RecurrenceUnit,
) -> Subscription {
    Subscription {
        id: id.to_string(),
        product_id: product.to_string(),
        created_at: ts(created),
        deactivated_at: deactivated.map(ts),
        recurring_price_cents: cents,
        recurrence_unit: unit,
    }
}

fn fixture_store(tz: &str) -> ChurnStore {
    let store = ChurnStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.upsert_account("acct", tz, false).unwrap();
    store.upsert_product("standard", "acct", "Standard", false).unwrap();
    store.upsert_product("annual", "acct", "Annual", false).unwrap();

    let subs = [
        // Two pre-period survivors.
        sub("s1", "standard", "2023-11-01 09:00:00", None, 1000, RecurrenceUnit::Monthly),
        sub("s2", "standard", "2023-11-05 09:00:00", None, 1000, RecurrenceUnit::Monthly),
        // Created at the period's first instant: new, not active-at-start.
        sub("s3", "standard", "2023-12-01 00:00:00", None, 1000, RecurrenceUnit::Monthly),
        // Churned mid-period.
        sub("s4", "standard", "2023-10-10 09:00:00", Some("2023-12-20 12:00:00"), 1000, RecurrenceUnit::Monthly),
        // Deactivated at the period's last second: still churned.
        sub("s5", "annual", "2023-09-01 09:00:00", Some("2023-12-31 23:59:59"), 12000, RecurrenceUnit::Yearly),
        // Same-day create + churn of different subscriptions on Dec 16.
        sub("s6", "standard", "2023-12-16 08:00:00", None, 1000, RecurrenceUnit::Monthly),
        sub("s7", "standard", "2023-11-20 09:00:00", Some("2023-12-16 20:00:00"), 1000, RecurrenceUnit::Monthly),
        // Outside the period entirely.
        sub("s8", "standard", "2024-01-02 09:00:00", None, 1000, RecurrenceUnit::Monthly),
    ];
    for s in &subs {
        store.insert_subscription("acct", s).unwrap();
    }
    store
}

fn december() -> Period {
    Period::new(d(2023, 12, 1), d(2023, 12, 31))
}

fn req<'a>(tz: &Tz, filter: &'a [String]) -> FetchRequest<'a> {
    FetchRequest {
        account_id: "acct",
        tz: *tz,
        product_filter: filter,
    }
}

// ── Two-source contract ──────────────────────────────────────────────────────

/// The scan and the index aggregation must produce identical raw series
/// for the same data — the substitutability contract.
#[test]
fn scan_and_index_produce_identical_series() {
    let store = fixture_store("UTC");
    let tz: Tz = "UTC".parse().unwrap();
    let filter: Vec<String> = vec![];

    let scan = RelationalScanSource::new(&store);
    let index = IndexAggregationSource::new(&store);

    let from_scan = scan.fetch_daily_raw_counts(&req(&tz, &filter), december()).unwrap();
    let from_index = index.fetch_daily_raw_counts(&req(&tz, &filter), december()).unwrap();

    assert_eq!(from_scan, from_index);
    assert_eq!(from_scan.days.len(), 31, "one dense entry per day");
}

#[test]
fn scan_and_index_agree_under_product_filter() {
    let store = fixture_store("UTC");
    let tz: Tz = "UTC".parse().unwrap();
    let filter = vec!["annual".to_string()];

    let scan = RelationalScanSource::new(&store);
    let index = IndexAggregationSource::new(&store);

    let from_scan = scan.fetch_daily_raw_counts(&req(&tz, &filter), december()).unwrap();
    let from_index = index.fetch_daily_raw_counts(&req(&tz, &filter), december()).unwrap();

    assert_eq!(from_scan, from_index);
    assert_eq!(from_scan.active_at_start, 1);
    let churned: i64 = from_scan.days.iter().map(|d| d.churned_subscribers).sum();
    assert_eq!(churned, 1);
}

// ── Boundary inclusivity ─────────────────────────────────────────────────────

#[test]
fn period_boundaries_are_inclusive_at_day_granularity() {
    let store = fixture_store("UTC");
    let tz: Tz = "UTC".parse().unwrap();
    let filter: Vec<String> = vec![];

    let scan = RelationalScanSource::new(&store);
    let series = scan.fetch_daily_raw_counts(&req(&tz, &filter), december()).unwrap();

    // s3 created at Dec 1 00:00:00 is new on day 1, not active-at-start.
    // Active at start: s1, s2, s4, s5, s7.
    assert_eq!(series.active_at_start, 5);
    assert_eq!(series.days[0].new_subscribers, 1);

    // s5 deactivated Dec 31 23:59:59 counts as churned on day 31.
    assert_eq!(series.days[30].churned_subscribers, 1);
    assert_eq!(series.days[30].churned_mrr_cents, 1000); // 12000/yr → 1000/mo
}

#[test]
fn same_day_new_and_churn_both_appear_in_the_bucket() {
    let store = fixture_store("UTC");
    let tz: Tz = "UTC".parse().unwrap();
    let filter: Vec<String> = vec![];

    let scan = RelationalScanSource::new(&store);
    let series = scan.fetch_daily_raw_counts(&req(&tz, &filter), december()).unwrap();

    // Dec 16: s6 created, s7 deactivated.
    assert_eq!(series.days[15].new_subscribers, 1);
    assert_eq!(series.days[15].churned_subscribers, 1);
}

// ── Timezone bucketing ───────────────────────────────────────────────────────

/// 02:00 UTC on Dec 16 is still Dec 15 in New York — both variants must
/// bucket it on the merchant-local day.
#[test]
fn events_bucket_on_the_merchant_local_day() {
    let store = ChurnStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.upsert_account("acct", "America/New_York", false).unwrap();
    store.upsert_product("standard", "acct", "Standard", false).unwrap();
    store
        .insert_subscription(
            "acct",
            &sub("s1", "standard", "2023-12-16 02:00:00", None, 1000, RecurrenceUnit::Monthly),
        )
        .unwrap();

    let tz: Tz = "America/New_York".parse().unwrap();
    let filter: Vec<String> = vec![];
    let period = december();

    let scan = RelationalScanSource::new(&store);
    let index = IndexAggregationSource::new(&store);

    let from_scan = scan.fetch_daily_raw_counts(&req(&tz, &filter), period).unwrap();
    let from_index = index.fetch_daily_raw_counts(&req(&tz, &filter), period).unwrap();

    assert_eq!(from_scan, from_index);
    assert_eq!(from_scan.days[14].new_subscribers, 1, "bucketed on local Dec 15");
    assert_eq!(from_scan.days[15].new_subscribers, 0);
}

/// A range crossing the fall-back transition (New York, 2023-11-05): events
/// in the post-transition hours near local midnight must stay on their true
/// local day in both variants, including the period's very last local hour.
#[test]
fn sources_agree_across_a_dst_transition() {
    let store = ChurnStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.upsert_account("acct", "America/New_York", false).unwrap();
    store.upsert_product("standard", "acct", "Standard", false).unwrap();

    let subs = [
        // Survivor, for a nonzero base.
        sub("s1", "standard", "2023-09-01 09:00:00", None, 1000, RecurrenceUnit::Monthly),
        // Created Nov 5 23:30 EST (Nov 6 04:30 UTC) — the transition day's
        // last pre-midnight hour, where the EDT offset would slip a day.
        sub("s2", "standard", "2023-11-06 04:30:00", None, 1000, RecurrenceUnit::Monthly),
        // Churned Nov 15 23:30 EST (Nov 16 04:30 UTC) — the period's final
        // local hour; a stale offset would push it past the window.
        sub("s3", "standard", "2023-10-01 09:00:00", Some("2023-11-16 04:30:00"), 1000, RecurrenceUnit::Monthly),
    ];
    for s in &subs {
        store.insert_subscription("acct", s).unwrap();
    }

    let tz: Tz = "America/New_York".parse().unwrap();
    let filter: Vec<String> = vec![];
    let period = Period::new(d(2023, 10, 15), d(2023, 11, 15));

    let scan = RelationalScanSource::new(&store);
    let index = IndexAggregationSource::new(&store);

    let from_scan = scan.fetch_daily_raw_counts(&req(&tz, &filter), period).unwrap();
    let from_index = index.fetch_daily_raw_counts(&req(&tz, &filter), period).unwrap();
    assert_eq!(from_scan, from_index, "variants must agree across the transition");

    // Oct 15 is index 0, Nov 5 index 21, Nov 15 index 31.
    assert_eq!(from_scan.days[21].new_subscribers, 1, "bucketed on local Nov 5");
    assert_eq!(from_scan.days[31].churned_subscribers, 1, "churn stays inside the period");
    let churned: i64 = from_scan.days.iter().map(|d| d.churned_subscribers).sum();
    assert_eq!(churned, 1);

    // Two constant-offset segments: two histogram pairs plus the active count.
    assert_eq!(index.queries_issued(), 5);
}

// ── Query-count bound ────────────────────────────────────────────────────────

/// The index variant's query count never scales with range length:
/// three per fetch when the window holds a single constant-offset segment.
#[test]
fn index_variant_query_count_is_constant() {
    let store = fixture_store("UTC");
    let tz: Tz = "UTC".parse().unwrap();
    let filter: Vec<String> = vec![];

    let index = IndexAggregationSource::new(&store);

    let ninety_days = Period::new(d(2023, 10, 1), d(2023, 12, 29));
    assert_eq!(ninety_days.time_window(), 90);
    index.fetch_daily_raw_counts(&req(&tz, &filter), ninety_days).unwrap();
    assert_eq!(index.queries_issued(), 3);

    let week = Period::new(d(2023, 12, 1), d(2023, 12, 7));
    index.fetch_daily_raw_counts(&req(&tz, &filter), week).unwrap();
    assert_eq!(index.queries_issued(), 6, "three more, independent of range length");
}
