use super::ChurnStore;
use crate::{
    classifier::{RecurrenceUnit, Subscription},
    error::ChurnResult,
    types::{Cents, ProductId},
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, types::Value};

/// SQL fragment normalizing a price to monthly-equivalent cents, matching
/// `classifier::monthly_recurring_revenue` (SQLite ROUND and f64::round
/// both round half away from zero; prices are non-negative).
const MRR_EXPR: &str = "CASE recurrence_unit
        WHEN 'monthly'   THEN recurring_price_cents
        WHEN 'yearly'    THEN CAST(ROUND(recurring_price_cents / 12.0) AS INTEGER)
        WHEN 'quarterly' THEN CAST(ROUND(recurring_price_cents / 3.0) AS INTEGER)
        ELSE 0 END";

fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Append `AND product_id IN (?, ...)` when a filter is present.
fn product_filter_clause(filter: &[ProductId], args: &mut Vec<Value>) -> String {
    if filter.is_empty() {
        return String::new();
    }
    let marks = vec!["?"; filter.len()].join(", ");
    for id in filter {
        args.push(Value::from(id.clone()));
    }
    format!(" AND product_id IN ({marks})")
}

impl ChurnStore {
    // ── Writes (fixtures, seeders) ─────────────────────────────

    pub fn insert_subscription(&self, account_id: &str, sub: &Subscription) -> ChurnResult<()> {
        self.conn().execute(
            "INSERT INTO subscription (
                subscription_id, account_id, product_id,
                created_at, deactivated_at,
                recurring_price_cents, recurrence_unit
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                sub.id,
                account_id,
                sub.product_id,
                sub.created_at.timestamp(),
                sub.deactivated_at.map(|t| t.timestamp()),
                sub.recurring_price_cents,
                sub.recurrence_unit.as_db(),
            ],
        )?;
        Ok(())
    }

    // ── Relational scan ────────────────────────────────────────

    /// All subscriptions overlapping the half-open window
    /// `[window_start, window_end)`: created before the window ends and
    /// either still active or deactivated on-or-after the window start.
    /// One query per fetch; classification happens in memory.
    pub fn load_overlapping_subscriptions(
        &self,
        account_id: &str,
        window_start: i64,
        window_end: i64,
        product_filter: &[ProductId],
    ) -> ChurnResult<Vec<Subscription>> {
        let mut args: Vec<Value> = vec![
            Value::from(account_id.to_string()),
            Value::from(window_end),
            Value::from(window_start),
        ];
        let filter_sql = product_filter_clause(product_filter, &mut args);

        let sql = format!(
            "SELECT subscription_id, product_id, created_at, deactivated_at,
                    recurring_price_cents, recurrence_unit
             FROM subscription
             WHERE account_id = ?
               AND created_at < ?
               AND (deactivated_at IS NULL OR deactivated_at >= ?){filter_sql}
             ORDER BY created_at ASC",
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let subs = stmt
            .query_map(params_from_iter(args), |row| {
                Ok(Subscription {
                    id:                    row.get(0)?,
                    product_id:            row.get(1)?,
                    created_at:            epoch_to_utc(row.get(2)?),
                    deactivated_at:        row.get::<_, Option<i64>>(3)?.map(epoch_to_utc),
                    recurring_price_cents: row.get(4)?,
                    recurrence_unit:       RecurrenceUnit::from_db(&row.get::<_, String>(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subs)
    }

    // ── Index-style aggregations ───────────────────────────────

    /// Day-bucketed histogram of new subscriptions within
    /// `[window_start, window_end)`, bucketed by the merchant's UTC offset.
    pub fn new_subscription_histogram(
        &self,
        account_id: &str,
        window_start: i64,
        window_end: i64,
        offset_seconds: i64,
        product_filter: &[ProductId],
    ) -> ChurnResult<Vec<(NaiveDate, i64)>> {
        let mut args: Vec<Value> = vec![
            Value::from(offset_seconds),
            Value::from(account_id.to_string()),
            Value::from(window_start),
            Value::from(window_end),
        ];
        let filter_sql = product_filter_clause(product_filter, &mut args);

        let sql = format!(
            "SELECT date(created_at + ?, 'unixepoch') AS day, COUNT(*)
             FROM subscription
             WHERE account_id = ?
               AND created_at >= ? AND created_at < ?{filter_sql}
             GROUP BY day ORDER BY day ASC",
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(parse_day_keys(rows))
    }

    /// Day-bucketed histogram of churn events within
    /// `[window_start, window_end)`, with index-side MRR normalization.
    pub fn churn_event_histogram(
        &self,
        account_id: &str,
        window_start: i64,
        window_end: i64,
        offset_seconds: i64,
        product_filter: &[ProductId],
    ) -> ChurnResult<Vec<(NaiveDate, i64, Cents)>> {
        let mut args: Vec<Value> = vec![
            Value::from(offset_seconds),
            Value::from(account_id.to_string()),
            Value::from(window_start),
            Value::from(window_end),
        ];
        let filter_sql = product_filter_clause(product_filter, &mut args);

        let sql = format!(
            "SELECT date(deactivated_at + ?, 'unixepoch') AS day,
                    COUNT(*),
                    COALESCE(SUM({MRR_EXPR}), 0)
             FROM subscription
             WHERE account_id = ?
               AND deactivated_at IS NOT NULL
               AND deactivated_at >= ? AND deactivated_at < ?{filter_sql}
             GROUP BY day ORDER BY day ASC",
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(day, count, mrr)| {
                NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                    .ok()
                    .map(|d| (d, count, mrr))
            })
            .collect())
    }

    /// Point-in-time cardinality: subscriptions created strictly before
    /// `boundary` and not yet deactivated as of it.
    pub fn active_count_at(
        &self,
        account_id: &str,
        boundary: i64,
        product_filter: &[ProductId],
    ) -> ChurnResult<i64> {
        let mut args: Vec<Value> = vec![
            Value::from(account_id.to_string()),
            Value::from(boundary),
            Value::from(boundary),
        ];
        let filter_sql = product_filter_clause(product_filter, &mut args);

        let sql = format!(
            "SELECT COUNT(*)
             FROM subscription
             WHERE account_id = ?
               AND created_at < ?
               AND (deactivated_at IS NULL OR deactivated_at >= ?){filter_sql}",
        );

        let count = self
            .conn()
            .query_row(&sql, params_from_iter(args), |row| row.get(0))?;
        Ok(count)
    }
}

fn parse_day_keys(rows: Vec<(String, i64)>) -> Vec<(NaiveDate, i64)> {
    rows.into_iter()
        .filter_map(|(day, count)| {
            NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                .ok()
                .map(|d| (d, count))
        })
        .collect()
}
