//! Lifetime totals over completed sessions.

use serde::Serialize;

use crate::types::FocusSession;

/// Counters recomputed from the full completed history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// Number of completed sessions
    pub total_sessions: i64,
    /// Sum of their durations
    pub total_minutes: i64,
    /// Trees planted; one per completed session under current rules
    pub trees_planted: i64,
}

/// Recompute totals from scratch.
///
/// Always a full pass over `completed` so that deletions are reflected
/// exactly. `trees_planted` mirrors `total_sessions` today but is kept
/// separate so the reward economy can change without a schema change.
pub fn recompute_totals(completed: &[FocusSession]) -> Totals {
    let total_sessions = completed.len() as i64;
    let total_minutes = completed
        .iter()
        .map(|s| i64::from(s.duration_minutes))
        .sum();

    Totals {
        total_sessions,
        total_minutes,
        trees_planted: total_sessions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn completed(minutes: u32) -> FocusSession {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut session = FocusSession::new("user-1", minutes, None, start);
        session.complete(start, None).unwrap();
        session
    }

    #[test]
    fn test_empty_history_is_zero() {
        assert_eq!(recompute_totals(&[]), Totals::default());
    }

    #[test]
    fn test_sums_minutes_and_counts_sessions() {
        let history = vec![completed(25), completed(50), completed(180), completed(1)];
        let totals = recompute_totals(&history);
        assert_eq!(totals.total_sessions, 4);
        assert_eq!(totals.total_minutes, 256);
        assert_eq!(totals.trees_planted, totals.total_sessions);
    }
}
