//! Date-range normalization — anchors "day" boundaries to the merchant's
//! timezone and derives the comparison period.
//!
//! RULES:
//!   - Parse failures are always an error (`InvalidDateFormat`), never a
//!     silent default.
//!   - Range validity (`end >= start`) is a *separate* check; callers pick
//!     the policy (raise vs. return-nothing) at the entry point.
//!   - All instant comparisons are half-open `[day_start(d), day_start(d+1))`
//!     in the merchant's local zone.

use crate::error::{ChurnError, ChurnResult};
use chrono::{DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ── Period ───────────────────────────────────────────────────────────────────

/// An inclusive calendar-date range in the merchant's local timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start_date: NaiveDate,
    pub end_date:   NaiveDate,
}

impl Period {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self { start_date, end_date }
    }

    /// Construct and validate in one step.
    pub fn checked(start_date: NaiveDate, end_date: NaiveDate) -> ChurnResult<Self> {
        let period = Self { start_date, end_date };
        period.validate()?;
        Ok(period)
    }

    pub fn is_valid(&self) -> bool {
        self.end_date >= self.start_date
    }

    pub fn validate(&self) -> ChurnResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ChurnError::InvalidDateRange {
                start: self.start_date,
                end:   self.end_date,
            })
        }
    }

    /// Inclusive day count: `end - start + 1`.
    pub fn time_window(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// The period of equal length immediately preceding this one.
    pub fn previous(&self) -> Period {
        let prev_end = self.start_date - Duration::days(1);
        let prev_start = prev_end - Duration::days(self.time_window() - 1);
        Period::new(prev_start, prev_end)
    }

    /// Days of the period in chronological order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end_date;
        self.start_date.iter_days().take_while(move |d| *d <= end)
    }
}

// ── Parameter resolution ─────────────────────────────────────────────────────

/// Raw range parameters as received from the request layer.
///
/// Two key names exist per endpoint: the explicit `start_date` / `end_date`
/// pair wins over the legacy `from` / `to` pair when both are present.
#[derive(Debug, Clone, Default)]
pub struct RangeParams {
    pub start_date: Option<String>,
    pub end_date:   Option<String>,
    pub from:       Option<String>,
    pub to:         Option<String>,
}

fn parse_date(input: &str) -> ChurnResult<NaiveDate> {
    NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|_| ChurnError::InvalidDateFormat {
        input: input.to_string(),
    })
}

/// Resolve raw parameters into a `Period`, defaulting the end to `today`
/// (in the merchant's zone) and the start to one calendar month before the
/// end. The returned range is *not* validated — see `Period::validate`.
pub fn resolve_period(params: &RangeParams, today: NaiveDate) -> ChurnResult<Period> {
    let end_raw = params.end_date.as_deref().or(params.to.as_deref());
    let end_date = match end_raw {
        Some(raw) => parse_date(raw)?,
        None => today,
    };

    let start_raw = params.start_date.as_deref().or(params.from.as_deref());
    let start_date = match start_raw {
        Some(raw) => parse_date(raw)?,
        // Clamped month arithmetic: Mar 31 - 1 month = Feb 28/29.
        None => end_date.checked_sub_months(Months::new(1)).unwrap_or(end_date),
    };

    Ok(Period::new(start_date, end_date))
}

// ── Timezone helpers ─────────────────────────────────────────────────────────

pub fn parse_timezone(name: &str) -> ChurnResult<Tz> {
    name.parse::<Tz>().map_err(|_| ChurnError::UnknownTimezone {
        name: name.to_string(),
    })
}

/// Local midnight of `date` in `tz`, as a UTC instant.
///
/// DST edges resolve deterministically: an ambiguous local midnight takes
/// the earliest instant; a nonexistent one (spring-forward gap) shifts
/// forward minute-by-minute to the first valid instant.
pub fn day_start(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let mut naive = date.and_time(NaiveTime::MIN);
    for _ in 0..180 {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => naive = naive + Duration::minutes(1),
        }
    }
    // No real zone has a 3-hour gap; interpret as UTC rather than loop on.
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Exclusive end of `date` in `tz`: the next day's local midnight, as UTC.
pub fn day_end_exclusive(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    day_start(date + Duration::days(1), tz)
}

/// Merchant-local calendar date of a UTC instant.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// A maximal sub-window of a UTC instant range over which the zone's UTC
/// offset does not change. Used for index-side day bucketing: within a
/// segment, `utc_instant + offset_seconds` lands on the correct local day
/// for every instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetSegment {
    pub window_start:   i64,
    pub window_end:     i64,
    pub offset_seconds: i64,
}

fn utc_offset_at(tz: Tz, secs: i64) -> i64 {
    use chrono::Offset;
    let instant = DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MIN_UTC);
    tz.offset_from_utc_datetime(&instant.naive_utc())
        .fix()
        .local_minus_utc() as i64
}

/// Split the half-open epoch-second window `[window_start, window_end)`
/// into constant-offset segments. A DST transition inside the window
/// starts a new segment at the exact transition second; most ranges come
/// back as a single segment.
pub fn constant_offset_segments(tz: Tz, window_start: i64, window_end: i64) -> Vec<OffsetSegment> {
    const STEP: i64 = 86_400;
    let mut segments = Vec::new();
    let mut lo = window_start;
    while lo < window_end {
        let offset = utc_offset_at(tz, lo);

        // Walk forward a day at a time until the offset changes.
        let mut same = lo;
        let mut diff = None;
        while diff.is_none() && same < window_end - 1 {
            let probe = (same + STEP).min(window_end - 1);
            if utc_offset_at(tz, probe) == offset {
                same = probe;
            } else {
                diff = Some(probe);
            }
        }

        let seg_end = match diff {
            None => window_end,
            // Bisect (same, hi] down to the transition second.
            Some(mut hi) => {
                while hi - same > 1 {
                    let mid = same + (hi - same) / 2;
                    if utc_offset_at(tz, mid) == offset {
                        same = mid;
                    } else {
                        hi = mid;
                    }
                }
                hi
            }
        };

        segments.push(OffsetSegment {
            window_start:   lo,
            window_end:     seg_end,
            offset_seconds: offset,
        });
        lo = seg_end;
    }
    segments
}

/// Human month label for the daily series, e.g. "December 2023".
pub fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

/// 0-based month offset of `date` from `origin`'s month.
pub fn month_index(origin: NaiveDate, date: NaiveDate) -> i32 {
    (date.year() - origin.year()) * 12 + (date.month() as i32 - origin.month() as i32)
}
