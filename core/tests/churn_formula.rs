use chrono::{DateTime, NaiveDateTime, Utc};
use churnmetrics_core::{
    aggregate::{aggregate_period, churn_rate, PeriodTotals},
    classifier::{monthly_recurring_revenue, RecurrenceUnit, Subscription},
    period::Period,
};

fn ts(raw: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .unwrap()
        .and_utc()
}

fn sub_with_unit(cents: i64, unit: RecurrenceUnit) -> Subscription {
    Subscription {
        id: "s".into(),
        product_id: "p".into(),
        created_at: ts("2023-01-01 00:00:00"),
        deactivated_at: None,
        recurring_price_cents: cents,
        recurrence_unit: unit,
    }
}

// ── Formula ──────────────────────────────────────────────────────────────────

/// Stripe's formula: churned ÷ (active-at-start + new), not ÷ active alone.
#[test]
fn churn_rate_divides_by_total_base() {
    assert_eq!(churn_rate(2, 1, 2), 40.00);
}

#[test]
fn churn_rate_rounds_to_two_decimals() {
    // 1/3 of the base churned: 33.333… → 33.33
    assert_eq!(churn_rate(3, 0, 1), 33.33);
    // 2/3: 66.666… → 66.67
    assert_eq!(churn_rate(3, 0, 2), 66.67);
}

/// An empty base is 0.0, never a division error.
#[test]
fn churn_rate_with_zero_base_is_zero() {
    for churned in [0, 1, 5] {
        assert_eq!(churn_rate(0, 0, churned), 0.0);
    }
}

#[test]
fn period_totals_expose_total_base() {
    let totals = PeriodTotals {
        active_at_start: 2,
        new_subscribers: 1,
        churned_subscribers: 2,
        churned_mrr_cents: 2000,
    };
    assert_eq!(totals.total_base(), 5);
    assert_eq!(totals.churn_rate(), 40.00);
}

// ── MRR normalization ────────────────────────────────────────────────────────

#[test]
fn mrr_normalizes_by_recurrence_unit() {
    assert_eq!(monthly_recurring_revenue(&sub_with_unit(1000, RecurrenceUnit::Monthly)), 1000);
    assert_eq!(monthly_recurring_revenue(&sub_with_unit(12000, RecurrenceUnit::Yearly)), 1000);
    assert_eq!(monthly_recurring_revenue(&sub_with_unit(3000, RecurrenceUnit::Quarterly)), 1000);
    assert_eq!(monthly_recurring_revenue(&sub_with_unit(1000, RecurrenceUnit::Other)), 0);
}

#[test]
fn mrr_rounds_the_divided_quotient() {
    // 10000/12 = 833.33… → 833
    assert_eq!(monthly_recurring_revenue(&sub_with_unit(10000, RecurrenceUnit::Yearly)), 833);
    // 1000/3 = 333.33… → 333
    assert_eq!(monthly_recurring_revenue(&sub_with_unit(1000, RecurrenceUnit::Quarterly)), 333);
    // 50/3 = 16.66… → 17
    assert_eq!(monthly_recurring_revenue(&sub_with_unit(50, RecurrenceUnit::Quarterly)), 17);
    // 18/12 = 1.5 → 2 (half away from zero)
    assert_eq!(monthly_recurring_revenue(&sub_with_unit(18, RecurrenceUnit::Yearly)), 2);
}

/// Unrecognized cadence strings degrade to the zero-MRR bucket.
#[test]
fn unknown_unit_string_maps_to_other() {
    assert_eq!(RecurrenceUnit::from_db("weekly"), RecurrenceUnit::Other);
    assert_eq!(RecurrenceUnit::from_db(""), RecurrenceUnit::Other);
    assert_eq!(RecurrenceUnit::from_db("monthly"), RecurrenceUnit::Monthly);
}

// ── In-memory aggregation ────────────────────────────────────────────────────

#[test]
fn aggregate_period_classifies_and_sums() {
    let tz: chrono_tz::Tz = "UTC".parse().unwrap();
    let period = Period::new(
        ts("2023-12-01 00:00:00").date_naive(),
        ts("2023-12-31 00:00:00").date_naive(),
    );

    let mut survivor = sub_with_unit(1000, RecurrenceUnit::Monthly);
    survivor.created_at = ts("2023-11-01 09:00:00");

    let mut newcomer = sub_with_unit(1000, RecurrenceUnit::Monthly);
    newcomer.created_at = ts("2023-12-16 09:00:00");

    let mut churned_monthly = sub_with_unit(1000, RecurrenceUnit::Monthly);
    churned_monthly.created_at = ts("2023-10-10 09:00:00");
    churned_monthly.deactivated_at = Some(ts("2023-12-20 09:00:00"));

    let mut churned_yearly = sub_with_unit(12000, RecurrenceUnit::Yearly);
    churned_yearly.created_at = ts("2023-09-01 09:00:00");
    churned_yearly.deactivated_at = Some(ts("2023-12-25 09:00:00"));

    let subs = [survivor, newcomer, churned_monthly, churned_yearly];
    let totals = aggregate_period(&subs, period, tz);

    assert_eq!(totals.active_at_start, 3);
    assert_eq!(totals.new_subscribers, 1);
    assert_eq!(totals.churned_subscribers, 2);
    assert_eq!(totals.churned_mrr_cents, 2000);
    assert_eq!(totals.churn_rate(), 50.0);
}
