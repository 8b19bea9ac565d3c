//! Integration tests for the focusforest tracker and store
//!
//! These tests run against a SQLite file in a temp directory to verify the
//! end-to-end flow from session lifecycle to persisted stats and reports.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use focusforest_core::analytics::BucketLabel;
use focusforest_core::{
    Config, Database, Error, FocusSession, FocusTracker, StreakMode, User, UserStatsSnapshot,
};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 29, 17, 30, 0).unwrap()
}

fn open_tracker(path: &Path, config: Config) -> FocusTracker {
    focusforest_core::logging::init_test();
    let db = Database::open(path).expect("failed to open database");
    db.migrate().expect("failed to migrate database");
    FocusTracker::new(db, config)
}

fn setup(config: Config) -> (TempDir, FocusTracker, User) {
    let dir = TempDir::new().unwrap();
    let tracker = open_tracker(&dir.path().join("data.db"), config);
    let user = tracker
        .create_user("ada", now() - Duration::days(60))
        .unwrap();
    (dir, tracker, user)
}

fn plant(tracker: &FocusTracker, user: &User, minutes: u32, ended_at: DateTime<Utc>) -> FocusSession {
    let started = ended_at - Duration::minutes(minutes as i64);
    let session = tracker
        .start_session(&user.id, minutes, None, started)
        .unwrap();
    tracker
        .complete_session(&user.id, &session.id, None, ended_at)
        .unwrap()
        .session
}

// ============================================
// Snapshot Tests
// ============================================

#[test]
fn test_totals_match_completed_history() {
    let (_dir, tracker, user) = setup(Config::default());
    for (minutes, days_ago) in [(25, 4), (50, 2), (15, 2), (90, 0)] {
        plant(&tracker, &user, minutes, now() - Duration::days(days_ago));
    }
    // pending sessions never count
    tracker.start_session(&user.id, 45, None, now()).unwrap();

    let stats = tracker.stats(&user.id).unwrap();
    assert_eq!(stats.total_sessions, 4);
    assert_eq!(stats.total_minutes, 180);
    assert_eq!(stats.trees_planted, 4);
    assert_eq!(stats.current_streak, 1);
    assert_eq!(stats.longest_streak, 1);
}

#[test]
fn test_snapshot_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.db");
    let user_id = {
        let tracker = open_tracker(&path, Config::default());
        let user = tracker.create_user("ada", now()).unwrap();
        plant(&tracker, &user, 25, now() - Duration::days(1));
        plant(&tracker, &user, 25, now());
        user.id
    };

    let tracker = open_tracker(&path, Config::default());
    let stats = tracker.stats(&user_id).unwrap();
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.current_streak, 2);
    assert_eq!(stats.last_session_date, Some(now().date_naive()));
    assert_eq!(stats.version, 2);
}

#[test]
fn test_incremental_streak_scenarios() {
    let mut config = Config::default();
    config.stats.streak_mode = StreakMode::Incremental;
    let (_dir, tracker, user) = setup(config);

    // first completion today
    let first = plant(&tracker, &user, 25, now());
    let stats = tracker.stats(&user.id).unwrap();
    assert_eq!((stats.current_streak, stats.longest_streak), (1, 1));
    assert_eq!(stats.last_session_date, first.end_day());

    // another completion on the same day does not extend the streak
    plant(&tracker, &user, 25, now() + Duration::minutes(30));
    let stats = tracker.stats(&user.id).unwrap();
    assert_eq!((stats.current_streak, stats.longest_streak), (1, 1));

    // next day extends it
    plant(&tracker, &user, 25, now() + Duration::days(1));
    let stats = tracker.stats(&user.id).unwrap();
    assert_eq!((stats.current_streak, stats.longest_streak), (2, 2));

    // a gap restarts at 1 and keeps the longest
    plant(&tracker, &user, 25, now() + Duration::days(4));
    let stats = tracker.stats(&user.id).unwrap();
    assert_eq!((stats.current_streak, stats.longest_streak), (1, 2));
}

#[test]
fn test_recompute_streak_follows_deletions() {
    let (_dir, tracker, user) = setup(Config::default());
    plant(&tracker, &user, 25, now() - Duration::days(3));
    let middle = plant(&tracker, &user, 25, now() - Duration::days(2));
    plant(&tracker, &user, 25, now() - Duration::days(1));
    plant(&tracker, &user, 25, now());
    assert_eq!(tracker.stats(&user.id).unwrap().current_streak, 4);

    let stats = tracker.delete_session(&user.id, &middle.id, now()).unwrap();
    assert_eq!(stats.current_streak, 2);
    assert_eq!(stats.longest_streak, 4);
    assert_eq!(stats.total_sessions, 3);
}

#[test]
fn test_unlocked_trees_never_shrink() {
    let (_dir, tracker, user) = setup(Config::default());
    let sessions: Vec<FocusSession> = (0..5)
        .map(|i| plant(&tracker, &user, 10, now() - Duration::minutes(15 * i)))
        .collect();
    assert_eq!(
        tracker.stats(&user.id).unwrap().unlocked_trees,
        vec!["pine", "oak"]
    );

    let stats = tracker
        .delete_session(&user.id, &sessions[0].id, now())
        .unwrap();
    assert_eq!(stats.trees_planted, 4);
    assert_eq!(stats.unlocked_trees, vec!["pine", "oak"]);
}

// ============================================
// Concurrency Tests
// ============================================

#[test]
fn test_stale_snapshot_write_conflicts() {
    let (_dir, tracker, user) = setup(Config::default());
    let db = tracker.database();
    let snapshot = db.get_snapshot(&user.id).unwrap().unwrap();

    let mut first = snapshot.clone();
    first.total_sessions = 1;
    db.save_snapshot(&first, snapshot.version).unwrap();

    let mut second: UserStatsSnapshot = snapshot.clone();
    second.total_sessions = 7;
    let err = db.save_snapshot(&second, snapshot.version).unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
    assert_eq!(db.get_snapshot(&user.id).unwrap().unwrap().total_sessions, 1);
}

#[test]
fn test_two_trackers_on_one_file_agree() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.db");
    let mut config = Config::default();
    config.stats.max_conflict_retries = 50;

    let setup_tracker = open_tracker(&path, config.clone());
    let user = setup_tracker.create_user("ada", now()).unwrap();
    let pending: Vec<FocusSession> = (0..10)
        .map(|_| setup_tracker.start_session(&user.id, 20, None, now()).unwrap())
        .collect();
    drop(setup_tracker);

    let trackers = [
        Arc::new(open_tracker(&path, config.clone())),
        Arc::new(open_tracker(&path, config.clone())),
    ];

    let handles: Vec<_> = pending
        .into_iter()
        .enumerate()
        .map(|(i, session)| {
            let tracker = Arc::clone(&trackers[i % 2]);
            let user_id = user.id.clone();
            thread::spawn(move || {
                tracker
                    .complete_session(&user_id, &session.id, None, now())
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = trackers[0].stats(&user.id).unwrap();
    assert_eq!(stats.total_sessions, 10);
    assert_eq!(stats.total_minutes, 200);
    assert!(stats.version >= 10);
}

// ============================================
// Report Tests
// ============================================

#[test]
fn test_week_report_buckets_by_day() {
    let (_dir, tracker, user) = setup(Config::default());
    let today = now().date_naive();
    plant(&tracker, &user, 30, now() - Duration::days(6));
    plant(&tracker, &user, 15, now() - Duration::days(6) + Duration::hours(1));
    plant(&tracker, &user, 50, now());
    // outside the window
    plant(&tracker, &user, 40, now() - Duration::days(7));

    let report = tracker.weekly_report(&user.id, today).unwrap();
    assert_eq!(report.window_start, today - Duration::days(6));
    assert_eq!(report.window_end, today);

    let minutes: Vec<i64> = report.buckets.iter().map(|b| b.minutes).collect();
    assert_eq!(minutes, vec![45, 0, 0, 0, 0, 0, 50]);
    assert_eq!(report.buckets[0].sessions, 2);
    assert_eq!(report.total.minutes, 95);
    assert_eq!(
        report.buckets[6].label,
        BucketLabel::Day { date: today }
    );
}

#[test]
fn test_month_report_folds_tail_into_last_bucket() {
    let (_dir, tracker, user) = setup(Config::default());
    let today = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let month_ago = today - Duration::days(30);
    for offset in [0, 7, 14, 21, 28, 29] {
        let day = month_ago + Duration::days(offset);
        let ended = Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap());
        plant(&tracker, &user, 10, ended);
    }

    let report = tracker.monthly_report(&user.id, today).unwrap();
    let minutes: Vec<i64> = report.buckets.iter().map(|b| b.minutes).collect();
    assert_eq!(minutes, vec![10, 10, 10, 30]);
    assert_eq!(report.total.sessions, 6);

    match &report.buckets[3].label {
        BucketLabel::Week {
            week,
            start_date,
            end_date,
        } => {
            assert_eq!(*week, 4);
            assert_eq!(*start_date, month_ago + Duration::days(21));
            assert_eq!(*end_date, month_ago + Duration::days(27));
        }
        other => panic!("expected a week label, got {:?}", other),
    }
}

#[test]
fn test_reports_only_cover_the_requesting_user() {
    let (_dir, tracker, ada) = setup(Config::default());
    let bob = tracker.create_user("bob", now()).unwrap();
    plant(&tracker, &ada, 25, now());
    plant(&tracker, &bob, 60, now());

    let report = tracker.weekly_report(&ada.id, now().date_naive()).unwrap();
    assert_eq!(report.total.minutes, 25);
    assert_eq!(tracker.stats(&bob.id).unwrap().total_minutes, 60);
}
