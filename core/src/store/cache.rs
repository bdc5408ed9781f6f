use super::ChurnStore;
use crate::{
    cache::{CacheStore, CachedDayCounts},
    error::ChurnResult,
};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, params_from_iter, types::Value};
use std::collections::HashMap;

impl CacheStore for ChurnStore {
    fn get_many(&self, keys: &[String]) -> ChurnResult<HashMap<String, CachedDayCounts>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let marks = vec!["?"; keys.len()].join(", ");
        let sql = format!(
            "SELECT cache_key, new_subscribers, churned_subscribers, churned_mrr_cents
             FROM churn_daily_cache
             WHERE cache_key IN ({marks})",
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(
                params_from_iter(keys.iter().map(|k| Value::from(k.clone()))),
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        CachedDayCounts {
                            new_subscribers:     row.get(1)?,
                            churned_subscribers: row.get(2)?,
                            churned_mrr_cents:   row.get(3)?,
                        },
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().collect())
    }

    fn put(&self, key: &str, day: NaiveDate, counts: &CachedDayCounts) -> ChurnResult<()> {
        // Last write wins: concurrent writers compute identical values.
        self.conn().execute(
            "INSERT INTO churn_daily_cache (
                cache_key, day, new_subscribers, churned_subscribers,
                churned_mrr_cents, written_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(cache_key) DO UPDATE SET
                new_subscribers = excluded.new_subscribers,
                churned_subscribers = excluded.churned_subscribers,
                churned_mrr_cents = excluded.churned_mrr_cents,
                written_at = excluded.written_at",
            params![
                key,
                day.to_string(),
                counts.new_subscribers,
                counts.churned_subscribers,
                counts.churned_mrr_cents,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }
}
