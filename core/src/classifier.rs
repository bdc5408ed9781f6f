//! Subscription classification — pure predicates deciding, for a day or
//! period boundary, whether a subscription is active-at-start, new, or
//! churned, and what it contributes in monthly recurring revenue.
//!
//! Boundary contract (day granularity, merchant-local):
//!   - created on day `d` counts as "new" on `d`, never "active at start"
//!     of `d` — active-at-start requires strictly earlier creation.
//!   - deactivation at any instant of day `d` (through 23:59:59) counts
//!     as churned on `d`.

use crate::{
    period::{day_end_exclusive, day_start},
    types::{Cents, ProductId},
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

// ── Records ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceUnit {
    Monthly,
    Yearly,
    Quarterly,
    /// Unrecognized billing cadence. Contributes zero MRR; a data-quality
    /// condition, not an error.
    Other,
}

impl RecurrenceUnit {
    pub fn from_db(raw: &str) -> Self {
        match raw {
            "monthly"   => Self::Monthly,
            "yearly"    => Self::Yearly,
            "quarterly" => Self::Quarterly,
            _           => Self::Other,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Monthly   => "monthly",
            Self::Yearly    => "yearly",
            Self::Quarterly => "quarterly",
            Self::Other     => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id:                    String,
    pub product_id:            ProductId,
    pub created_at:            DateTime<Utc>,
    pub deactivated_at:        Option<DateTime<Utc>>,
    pub recurring_price_cents: Cents,
    pub recurrence_unit:       RecurrenceUnit,
}

// ── Predicates ───────────────────────────────────────────────────────────────

/// Existed before `date` began and had not ended as of `date`'s first instant.
pub fn active_at_start(sub: &Subscription, date: NaiveDate, tz: Tz) -> bool {
    let boundary = day_start(date, tz);
    sub.created_at < boundary
        && sub.deactivated_at.map_or(true, |ended| ended >= boundary)
}

/// Created at any instant of the inclusive day range `[from, to]`.
pub fn new_during(sub: &Subscription, from: NaiveDate, to: NaiveDate, tz: Tz) -> bool {
    sub.created_at >= day_start(from, tz) && sub.created_at < day_end_exclusive(to, tz)
}

/// Deactivated at any instant of the inclusive day range `[from, to]`.
pub fn churned_during(sub: &Subscription, from: NaiveDate, to: NaiveDate, tz: Tz) -> bool {
    match sub.deactivated_at {
        Some(ended) => ended >= day_start(from, tz) && ended < day_end_exclusive(to, tz),
        None => false,
    }
}

/// Monthly-equivalent revenue in cents: yearly and quarterly prices are
/// divided down and rounded; unknown cadences contribute nothing.
pub fn monthly_recurring_revenue(sub: &Subscription) -> Cents {
    match sub.recurrence_unit {
        RecurrenceUnit::Monthly   => sub.recurring_price_cents,
        RecurrenceUnit::Yearly    => (sub.recurring_price_cents as f64 / 12.0).round() as Cents,
        RecurrenceUnit::Quarterly => (sub.recurring_price_cents as f64 / 3.0).round() as Cents,
        RecurrenceUnit::Other     => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use chrono_tz::Tz;

    fn ts(raw: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    fn sub(created: &str, deactivated: Option<&str>) -> Subscription {
        Subscription {
            id: "s1".into(),
            product_id: "p1".into(),
            created_at: ts(created),
            deactivated_at: deactivated.map(ts),
            recurring_price_cents: 1000,
            recurrence_unit: RecurrenceUnit::Monthly,
        }
    }

    #[test]
    fn same_day_creation_is_new_not_active() {
        let tz: Tz = "UTC".parse().unwrap();
        let day = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        let s = sub("2023-12-01 00:00:00", None);

        assert!(!active_at_start(&s, day, tz));
        assert!(new_during(&s, day, day, tz));
    }

    #[test]
    fn classification_uses_merchant_local_day() {
        // 02:00 UTC on Dec 16 is still Dec 15 in New York.
        let tz: Tz = "America/New_York".parse().unwrap();
        let s = sub("2023-12-16 02:00:00", None);
        let dec15 = NaiveDate::from_ymd_opt(2023, 12, 15).unwrap();
        let dec16 = NaiveDate::from_ymd_opt(2023, 12, 16).unwrap();

        assert!(new_during(&s, dec15, dec15, tz));
        assert!(!new_during(&s, dec16, dec16, tz));
    }
}
