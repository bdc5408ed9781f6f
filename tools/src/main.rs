//! churn-report: headless churn report runner.
//!
//! Usage:
//!   churn-report --db merchants.db --account acct_1 \
//!       --start 2023-12-01 --end 2023-12-31 --source index
//!   churn-report --demo --start 2023-12-01 --end 2023-12-31

use anyhow::Result;
use churnmetrics_core::{
    classifier::{RecurrenceUnit, Subscription},
    config::ReportConfig,
    period::RangeParams,
    service::{ChurnQuery, ChurnService, RangePolicy},
    source::SourceKind,
    store::ChurnStore,
};
use chrono::{NaiveDate, Utc};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = flag(&args, "--db").unwrap_or(":memory:");
    let account = flag(&args, "--account").unwrap_or("demo");
    let demo = args.iter().any(|a| a == "--demo");

    let source = match flag(&args, "--source") {
        Some("index") => SourceKind::IndexAggregation,
        _ => SourceKind::RelationalScan,
    };

    let store = ChurnStore::open(db)?;
    store.migrate()?;

    if demo {
        seed_demo(&store, account)?;
        log::info!("seeded demo dataset for account '{account}' (December 2023)");
    }

    let config = ReportConfig {
        source,
        ..ReportConfig::default()
    };
    let service = ChurnService::new(&store, config);

    let query = ChurnQuery {
        account_id: account.to_string(),
        range: RangeParams {
            start_date: flag(&args, "--start").map(str::to_string),
            end_date: flag(&args, "--end").map(str::to_string),
            ..RangeParams::default()
        },
        product_ids: flag(&args, "--products")
            .map(|raw| raw.split(',').map(str::to_string).collect()),
    };

    match service.fetch_churn_data(&query, RangePolicy::Strict, Utc::now())? {
        Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
        None => println!("null"),
    }

    Ok(())
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == name).map(|w| w[1].as_str())
}

/// A small December-2023 dataset: four pre-period subscriptions, one new
/// mid-month, two churns (one monthly, one yearly).
fn seed_demo(store: &ChurnStore, account: &str) -> Result<()> {
    store.upsert_account(account, "UTC", false)?;
    store.upsert_product("standard", account, "Standard ($10/mo)", false)?;
    store.upsert_product("annual", account, "Annual ($120/yr)", false)?;

    let sub = |id: &str, product: &str, created: (i32, u32, u32), ended: Option<(i32, u32, u32)>, cents: i64, unit: RecurrenceUnit| {
        Subscription {
            id: id.to_string(),
            product_id: product.to_string(),
            created_at: date(created).and_hms_opt(12, 0, 0).unwrap_or_default().and_utc(),
            deactivated_at: ended
                .map(|d| date(d).and_hms_opt(12, 0, 0).unwrap_or_default().and_utc()),
            recurring_price_cents: cents,
            recurrence_unit: unit,
        }
    };

    let subs = [
        sub("s1", "standard", (2023, 11, 1), None, 1000, RecurrenceUnit::Monthly),
        sub("s2", "standard", (2023, 11, 5), None, 1000, RecurrenceUnit::Monthly),
        sub("s3", "standard", (2023, 12, 16), None, 1000, RecurrenceUnit::Monthly),
        sub("s4", "standard", (2023, 10, 10), Some((2023, 12, 20)), 1000, RecurrenceUnit::Monthly),
        sub("s5", "annual", (2023, 9, 1), Some((2023, 12, 25)), 12000, RecurrenceUnit::Yearly),
    ];
    for s in &subs {
        store.insert_subscription(account, s)?;
    }

    Ok(())
}

fn date((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}
