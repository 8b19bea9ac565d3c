//! Analytics module for focusforest
//!
//! Turns a user's session history into derived values:
//! - Lifetime totals (sessions, minutes, trees planted)
//! - Current and longest streaks
//! - Unlocked trees
//! - Week/month reports bucketed by calendar day or 7-day block
//!
//! Everything here is a pure function of its inputs. Nothing reads the
//! clock or touches the database; the caller supplies the reference time
//! and persists the results (see [`crate::tracker`]).

pub mod buckets;
pub mod rewards;
pub mod snapshot;
pub mod streak;
pub mod totals;
pub mod validate;

pub use buckets::{
    bucket_month, bucket_week, bucket_window, BucketLabel, BucketLayout, BucketTotals, Overflow,
    PeriodBucket, PeriodReport, ReportPeriod,
};
pub use rewards::{next_unlock, unlock_trees};
pub use snapshot::recompute_snapshot;
pub use streak::{recompute_streak, update_streak, StreakMode, StreakState};
pub use totals::{recompute_totals, Totals};
pub use validate::{
    validate_completed_history, validate_duration, validate_session, DurationBounds,
};
