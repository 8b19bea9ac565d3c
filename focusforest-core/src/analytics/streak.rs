//! Streak derivation.
//!
//! A streak is the number of consecutive calendar days with at least one
//! completed session, anchored to the most recent completion. Two ways of
//! computing it are provided:
//!
//! - [`update_streak`] extends the previously stored snapshot. It only
//!   looks at the latest completion day and the snapshot's
//!   `last_session_date`, so it must be fed the snapshot that was current
//!   right before the session event.
//! - [`recompute_streak`] rebuilds the streak from the whole completed
//!   history and needs nothing from the previous snapshot except the
//!   longest streak, which never regresses.
//!
//! Which one the tracker uses is selected by [`StreakMode`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{FocusSession, UserStatsSnapshot};

/// Streak derivation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakMode {
    /// Rebuild from the full history on every change
    #[default]
    Recompute,
    /// Extend the previous snapshot
    Incremental,
}

/// Streak fields of a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreakState {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub last_session_date: Option<NaiveDate>,
}

fn latest_day(completed: &[FocusSession]) -> Option<NaiveDate> {
    completed.iter().filter_map(FocusSession::end_day).max()
}

/// Extend the previous snapshot's streak with the latest completion.
///
/// - no completions: the streak drops to 0, the longest streak is kept
/// - latest completion today and today already credited: unchanged
/// - two or more days since the previous `last_session_date`: restart at 1
/// - latest completion today or yesterday: +1
/// - anything older: the streak restarts at 1
///
/// Deleting the most recent session and calling this again compares an
/// older completion day against the stale `last_session_date` and can
/// increment instead of shrink the streak. Use [`recompute_streak`] when
/// deletions must be reflected exactly.
pub fn update_streak(
    completed: &[FocusSession],
    previous: &UserStatsSnapshot,
    reference_now: DateTime<Utc>,
) -> StreakState {
    let Some(last_day) = latest_day(completed) else {
        return StreakState {
            current_streak: 0,
            longest_streak: previous.longest_streak,
            last_session_date: None,
        };
    };

    let today = reference_now.date_naive();
    let yesterday = today - Duration::days(1);

    let gap_since_previous = previous
        .last_session_date
        .map(|prev| (last_day - prev).num_days());

    let current_streak = if last_day == today && previous.last_session_date == Some(today) {
        previous.current_streak
    } else if matches!(gap_since_previous, Some(gap) if gap >= 2) {
        1
    } else if last_day == today || last_day == yesterday {
        previous.current_streak + 1
    } else {
        1
    };

    StreakState {
        current_streak,
        longest_streak: previous.longest_streak.max(current_streak),
        last_session_date: Some(last_day),
    }
}

/// Rebuild the streak from the completed history.
///
/// `current_streak` is the run of consecutive days ending at the latest
/// completion. Completions dated after `reference_now` are ignored.
pub fn recompute_streak(
    completed: &[FocusSession],
    previous_longest: i64,
    reference_now: DateTime<Utc>,
) -> StreakState {
    let today = reference_now.date_naive();
    let mut days: Vec<NaiveDate> = completed
        .iter()
        .filter_map(FocusSession::end_day)
        .filter(|day| *day <= today)
        .collect();
    days.sort_unstable();
    days.dedup();

    let mut run = 0i64;
    let mut longest_run = 0i64;
    let mut prev: Option<NaiveDate> = None;

    for &day in &days {
        run = match prev {
            Some(p) if (day - p).num_days() == 1 => run + 1,
            _ => 1,
        };
        longest_run = longest_run.max(run);
        prev = Some(day);
    }

    StreakState {
        current_streak: run,
        longest_streak: previous_longest.max(longest_run),
        last_session_date: prev,
    }
}
