//! Report bucketing.
//!
//! Splits completed sessions into fixed calendar slices for the week and
//! month reports:
//!
//! - **Week**: one bucket per day for the 7 days `week_ago + 1 ..= today`.
//!   A session lands in the bucket whose day equals its end day.
//! - **Month**: four 7-day buckets starting at `month_ago`. The window
//!   `month_ago ..= today` is longer than 28 days, so the trailing days are
//!   folded into the last bucket instead of opening a fifth one.
//!
//! Sessions whose end day falls outside the window are dropped silently;
//! the caller is expected to pre-filter. Both shapes are instances of a
//! [`BucketLayout`], so other window sizes work the same way.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::types::FocusSession;

/// Which report is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    Week,
    Month,
}

impl ReportPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::Week => "week",
            ReportPeriod::Month => "month",
        }
    }

    /// Inclusive day range covered by a report ending on `today`.
    ///
    /// The week window starts the day after `today - window_days`; the
    /// month window starts on `today - window_days` itself.
    pub fn window(&self, today: NaiveDate, layout: &BucketLayout) -> (NaiveDate, NaiveDate) {
        let anchor = shift_days(today, -i64::from(layout.window_days));
        match self {
            ReportPeriod::Week => (shift_days(anchor, 1).min(today), today),
            ReportPeriod::Month => (anchor, today),
        }
    }
}

impl std::str::FromStr for ReportPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" | "weekly" => Ok(ReportPeriod::Week),
            "month" | "monthly" => Ok(ReportPeriod::Month),
            _ => Err(format!("unknown report period: {}", s)),
        }
    }
}

/// `day + days`, clamped to the range `NaiveDate` can represent.
fn shift_days(day: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|delta| day.checked_add_signed(delta))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// What happens to days past the last full bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Ignore them
    Drop,
    /// Count them in the last bucket
    FoldIntoLast,
}

/// Shape of a report: how long the window is and how it is sliced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketLayout {
    /// Days between the window anchor and `today`
    pub window_days: u32,
    /// Width of one bucket in days
    pub bucket_days: u32,
    /// Number of buckets produced
    pub bucket_count: u32,
    /// Handling of days past `bucket_days * bucket_count`
    pub overflow: Overflow,
}

impl BucketLayout {
    /// Seven daily buckets.
    pub const WEEK: BucketLayout = BucketLayout {
        window_days: 7,
        bucket_days: 1,
        bucket_count: 7,
        overflow: Overflow::Drop,
    };

    /// Four weekly buckets over 30 days, trailing days folded into week 4.
    pub const MONTH: BucketLayout = BucketLayout {
        window_days: 30,
        bucket_days: 7,
        bucket_count: 4,
        overflow: Overflow::FoldIntoLast,
    };
}

/// Label of a bucket: a single day, or a numbered block with literal dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BucketLabel {
    Day {
        date: NaiveDate,
    },
    Week {
        week: u32,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
}

/// Minutes and session count for one slice of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodBucket {
    #[serde(flatten)]
    pub label: BucketLabel,
    pub minutes: i64,
    pub sessions: i64,
}

impl PeriodBucket {
    fn empty(label: BucketLabel) -> Self {
        Self {
            label,
            minutes: 0,
            sessions: 0,
        }
    }
}

/// Sum over a set of buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketTotals {
    pub minutes: i64,
    pub sessions: i64,
}

impl BucketTotals {
    pub fn of(buckets: &[PeriodBucket]) -> Self {
        buckets.iter().fold(Self::default(), |acc, b| Self {
            minutes: acc.minutes + b.minutes,
            sessions: acc.sessions + b.sessions,
        })
    }
}

/// A finished week or month report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodReport {
    pub period: ReportPeriod,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    #[serde(rename = "data")]
    pub buckets: Vec<PeriodBucket>,
    pub total: BucketTotals,
}

impl PeriodReport {
    /// Bucket `sessions` into the `period` report ending on `today`.
    pub fn build(
        period: ReportPeriod,
        sessions: &[FocusSession],
        today: NaiveDate,
        layout: &BucketLayout,
    ) -> Self {
        let (window_start, window_end) = period.window(today, layout);
        let buckets = bucket_window(sessions, window_start, window_end, layout);
        let total = BucketTotals::of(&buckets);
        Self {
            period,
            window_start,
            window_end,
            buckets,
            total,
        }
    }
}

/// Slice `first_day ..= last_day` according to `layout`.
///
/// Bucket `i` starts at `first_day + i * bucket_days`. A session's bucket
/// is `floor((end_day - first_day) / bucket_days)`; indexes past the last
/// bucket are dropped or folded depending on `layout.overflow`.
pub fn bucket_window(
    sessions: &[FocusSession],
    first_day: NaiveDate,
    last_day: NaiveDate,
    layout: &BucketLayout,
) -> Vec<PeriodBucket> {
    let width = layout.bucket_days.max(1);
    let mut buckets: Vec<PeriodBucket> = (0..layout.bucket_count)
        .map(|i| {
            let start = shift_days(first_day, i64::from(i) * i64::from(width));
            let label = if width == 1 {
                BucketLabel::Day { date: start }
            } else {
                BucketLabel::Week {
                    week: i + 1,
                    start_date: start,
                    end_date: shift_days(start, i64::from(width - 1)),
                }
            };
            PeriodBucket::empty(label)
        })
        .collect();

    if buckets.is_empty() {
        return buckets;
    }
    let last_index = buckets.len() - 1;

    for session in sessions {
        let Some(day) = session.end_day() else {
            continue;
        };
        if day < first_day || day > last_day {
            continue;
        }

        let offset = (day - first_day).num_days();
        let mut index = (offset / i64::from(width)) as usize;
        if index > last_index {
            match layout.overflow {
                Overflow::Drop => continue,
                Overflow::FoldIntoLast => index = last_index,
            }
        }

        let bucket = &mut buckets[index];
        bucket.minutes += i64::from(session.duration_minutes);
        bucket.sessions += 1;
    }

    buckets
}

/// Seven daily buckets for `week_ago + 1 ..= today`.
pub fn bucket_week(
    sessions: &[FocusSession],
    week_ago: NaiveDate,
    today: NaiveDate,
) -> Vec<PeriodBucket> {
    bucket_window(
        sessions,
        shift_days(week_ago, 1),
        today,
        &BucketLayout::WEEK,
    )
}

/// Four 7-day buckets for `month_ago ..= today`, overflow in bucket 4.
pub fn bucket_month(
    sessions: &[FocusSession],
    month_ago: NaiveDate,
    today: NaiveDate,
) -> Vec<PeriodBucket> {
    bucket_window(sessions, month_ago, today, &BucketLayout::MONTH)
}
