//! Assembling a complete stats snapshot.

use chrono::{DateTime, Utc};

use super::rewards::unlock_trees;
use super::streak::{recompute_streak, update_streak, StreakMode};
use super::totals::recompute_totals;
use super::validate::validate_completed_history;
use crate::error::Result;
use crate::types::{FocusSession, TreeType, UserStatsSnapshot};

/// Derive the next snapshot for `previous.user_id`.
///
/// `completed` must hold every completed session of the user. It is sorted
/// by end time here, so callers may pass it in any order. Either a full
/// snapshot is returned or [`crate::Error::InvalidInput`]; the previous
/// snapshot is never partially updated. The returned snapshot carries
/// `previous.version` so the store can detect concurrent writers.
pub fn recompute_snapshot(
    completed: &[FocusSession],
    previous: &UserStatsSnapshot,
    reference_now: DateTime<Utc>,
    mode: StreakMode,
    catalog: &[TreeType],
) -> Result<UserStatsSnapshot> {
    validate_completed_history(&previous.user_id, completed)?;

    let mut history = completed.to_vec();
    history.sort_by_key(|s| s.ended_at);

    let totals = recompute_totals(&history);
    let streak = match mode {
        StreakMode::Recompute => {
            recompute_streak(&history, previous.longest_streak, reference_now)
        }
        StreakMode::Incremental => update_streak(&history, previous, reference_now),
    };
    let unlocked_trees = unlock_trees(&previous.unlocked_trees, totals.trees_planted, catalog);

    tracing::debug!(
        user_id = %previous.user_id,
        sessions = totals.total_sessions,
        minutes = totals.total_minutes,
        current_streak = streak.current_streak,
        longest_streak = streak.longest_streak,
        ?mode,
        "Recomputed stats snapshot"
    );

    Ok(UserStatsSnapshot {
        user_id: previous.user_id.clone(),
        total_sessions: totals.total_sessions,
        total_minutes: totals.total_minutes,
        trees_planted: totals.trees_planted,
        current_streak: streak.current_streak,
        longest_streak: streak.longest_streak,
        last_session_date: streak.last_session_date,
        unlocked_trees,
        version: previous.version,
        updated_at: Some(reference_now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::TreeRarity;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 20, 12, 0, 0).unwrap()
    }

    fn completed(minutes: u32, days_ago: i64) -> FocusSession {
        let end = now() - Duration::days(days_ago);
        let mut s = FocusSession::new("user-1", minutes, None, end - Duration::minutes(5));
        s.complete(end, None).unwrap();
        s
    }

    fn catalog() -> Vec<TreeType> {
        vec![
            TreeType {
                id: "t1".to_string(),
                name: "pine".to_string(),
                display_name: "Pine Tree".to_string(),
                description: None,
                rarity: TreeRarity::Common,
                unlock_requirement: 0,
                color: "#22c55e".to_string(),
            },
            TreeType {
                id: "t2".to_string(),
                name: "oak".to_string(),
                display_name: "Oak Tree".to_string(),
                description: None,
                rarity: TreeRarity::Common,
                unlock_requirement: 2,
                color: "#16a34a".to_string(),
            },
        ]
    }

    #[test]
    fn test_full_snapshot_from_history() {
        // deliberately out of order
        let history = vec![completed(25, 0), completed(50, 2), completed(30, 1)];
        let mut previous = UserStatsSnapshot::new("user-1");
        previous.version = 4;

        let snapshot =
            recompute_snapshot(&history, &previous, now(), StreakMode::Recompute, &catalog())
                .unwrap();

        assert_eq!(snapshot.total_sessions, 3);
        assert_eq!(snapshot.total_minutes, 105);
        assert_eq!(snapshot.trees_planted, 3);
        assert_eq!(snapshot.current_streak, 3);
        assert_eq!(snapshot.longest_streak, 3);
        assert_eq!(snapshot.last_session_date, Some(now().date_naive()));
        assert_eq!(snapshot.unlocked_trees, vec!["pine", "oak"]);
        assert_eq!(snapshot.version, 4);
        assert_eq!(snapshot.updated_at, Some(now()));
    }

    #[test]
    fn test_incremental_mode_uses_previous_snapshot() {
        let history = vec![completed(25, 1), completed(25, 0)];
        let mut previous = UserStatsSnapshot::new("user-1");
        previous.current_streak = 5;
        previous.longest_streak = 5;
        previous.last_session_date = Some(now().date_naive() - Duration::days(1));

        let snapshot =
            recompute_snapshot(&history, &previous, now(), StreakMode::Incremental, &[])
                .unwrap();
        assert_eq!(snapshot.current_streak, 6);
        assert_eq!(snapshot.longest_streak, 6);
    }

    #[test]
    fn test_invalid_history_is_rejected() {
        let mut pending = completed(25, 0);
        pending.completed = false;
        pending.ended_at = None;
        let previous = UserStatsSnapshot::new("user-1");

        let result = recompute_snapshot(
            &[completed(25, 1), pending],
            &previous,
            now(),
            StreakMode::Recompute,
            &catalog(),
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_empty_history_resets_counters() {
        let mut previous = UserStatsSnapshot::new("user-1");
        previous.total_sessions = 2;
        previous.total_minutes = 50;
        previous.current_streak = 2;
        previous.longest_streak = 4;
        previous.unlocked_trees.push("oak".to_string());

        let snapshot =
            recompute_snapshot(&[], &previous, now(), StreakMode::Recompute, &catalog()).unwrap();
        assert_eq!(snapshot.total_sessions, 0);
        assert_eq!(snapshot.total_minutes, 0);
        assert_eq!(snapshot.current_streak, 0);
        assert_eq!(snapshot.longest_streak, 4);
        assert_eq!(snapshot.last_session_date, None);
        assert_eq!(snapshot.unlocked_trees, vec!["pine", "oak"]);
    }
}
