//! Session lifecycle service
//!
//! [`FocusTracker`] owns the database and drives everything that changes a
//! user's history: starting, completing and deleting sessions, followed by
//! a full recompute of the stats snapshot.
//!
//! Completing or deleting a session writes the session row and the new
//! snapshot in one transaction, so a failed save leaves both untouched.
//!
//! Recompute-and-persist is serialized per user in two layers. Inside one
//! process a per-user lock orders callers; across processes (or trackers
//! sharing a database file) the snapshot version acts as a compare-and-swap
//! and a stale writer re-reads and recomputes.

use crate::analytics::{
    recompute_snapshot, validate_duration, validate_session, DurationBounds, PeriodReport,
    ReportPeriod,
};
use crate::config::Config;
use crate::db::{Database, SessionChange, SessionFilter};
use crate::error::{Error, Result};
use crate::types::{FocusSession, User, UserStatsSnapshot};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of completing a session.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub session: FocusSession,
    pub stats: UserStatsSnapshot,
}

/// One page of a user's sessions, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct SessionPage {
    pub sessions: Vec<FocusSession>,
    /// All sessions of the user, regardless of paging
    pub total: i64,
    pub limit: usize,
    pub offset: usize,
}

/// Drives the session lifecycle for all users of one database.
pub struct FocusTracker {
    db: Database,
    config: Config,
    user_locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl FocusTracker {
    /// Wrap a migrated database.
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db,
            config,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn duration_bounds(&self) -> DurationBounds {
        DurationBounds {
            min: self.config.stats.min_duration_minutes,
            max: self.config.stats.max_duration_minutes,
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = lock(&self.user_locks);

        // Drop locks nobody holds once the map grows.
        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(user_id).and_then(Weak::upgrade) {
            return existing;
        }

        let user_lock = Arc::new(Mutex::new(()));
        locks.insert(user_id.to_string(), Arc::downgrade(&user_lock));
        user_lock
    }

    fn require_user(&self, user_id: &str) -> Result<User> {
        self.db
            .get_user(user_id)?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))
    }

    /// Fetch a session, hiding sessions of other users.
    fn owned_session(&self, user_id: &str, session_id: &str) -> Result<FocusSession> {
        match self.db.get_session(session_id)? {
            Some(session) if session.owner_id == user_id => Ok(session),
            _ => Err(Error::SessionNotFound(session_id.to_string())),
        }
    }

    // ============================================
    // Users
    // ============================================

    /// Register a user with an empty snapshot.
    pub fn create_user(&self, username: &str, now: DateTime<Utc>) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::InvalidInput("username must not be empty".to_string()));
        }
        let user = User::new(username, now);
        self.db.create_user(&user)?;
        Ok(user)
    }

    /// Look a user up by username.
    pub fn find_user(&self, username: &str) -> Result<User> {
        self.db
            .get_user_by_name(username)?
            .ok_or_else(|| Error::UserNotFound(username.to_string()))
    }

    // ============================================
    // Session lifecycle
    // ============================================

    /// Create a pending session.
    ///
    /// `tree` may name a tree type by ID or by name.
    pub fn start_session(
        &self,
        user_id: &str,
        duration_minutes: u32,
        tree: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<FocusSession> {
        self.require_user(user_id)?;
        validate_duration(duration_minutes, self.duration_bounds())?;

        let tree_type_id = match tree {
            Some(key) => Some(
                self.db
                    .get_tree_type(key)?
                    .ok_or_else(|| Error::TreeTypeNotFound(key.to_string()))?
                    .id,
            ),
            None => None,
        };

        let session = FocusSession::new(user_id, duration_minutes, tree_type_id, now);
        validate_session(&session)?;
        self.db.insert_session(&session)?;

        tracing::info!(
            user_id,
            session_id = %session.id,
            duration_minutes,
            "Started focus session"
        );
        Ok(session)
    }

    /// Complete a pending session and refresh the user's stats.
    pub fn complete_session(
        &self,
        user_id: &str,
        session_id: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Completion> {
        let user_lock = self.user_lock(user_id);
        let _guard = lock(&user_lock);

        let mut session = self.owned_session(user_id, session_id)?;
        session.complete(now, notes)?;
        let stats = self.commit_change(SessionChange::Complete(&session), now)?;

        tracing::info!(
            user_id,
            session_id,
            duration_minutes = session.duration_minutes,
            version = stats.version,
            "Completed focus session"
        );
        Ok(Completion { session, stats })
    }

    /// Delete a session. Stats are recomputed when a completed one goes.
    pub fn delete_session(
        &self,
        user_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UserStatsSnapshot> {
        let user_lock = self.user_lock(user_id);
        let _guard = lock(&user_lock);

        let session = self.owned_session(user_id, session_id)?;
        let stats = if session.completed {
            self.commit_change(SessionChange::Delete(&session), now)?
        } else {
            if !self.db.delete_session(&session.id)? {
                return Err(Error::SessionNotFound(session_id.to_string()));
            }
            self.stats(user_id)?
        };

        tracing::info!(user_id, session_id, completed = session.completed, "Deleted focus session");
        Ok(stats)
    }

    /// Persist `change` together with the snapshot recomputed from the
    /// history it leaves behind. Caller must hold the user's lock.
    fn commit_change(
        &self,
        change: SessionChange<'_>,
        now: DateTime<Utc>,
    ) -> Result<UserStatsSnapshot> {
        let catalog = self.db.list_tree_types()?;
        let mode = self.config.stats.streak_mode;
        let saved = self.db.commit_session_change(change, |completed, previous| {
            recompute_snapshot(completed, previous, now, mode, &catalog)
        })?;
        tracing::debug!(user_id = %saved.user_id, version = saved.version, "Saved stats snapshot");
        Ok(saved)
    }

    // ============================================
    // Stats
    // ============================================

    /// Recompute and persist the snapshot from the full session history.
    pub fn refresh_stats(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserStatsSnapshot> {
        let user_lock = self.user_lock(user_id);
        let _guard = lock(&user_lock);
        self.refresh_locked(user_id, now)
    }

    /// Caller must hold the user's lock.
    fn refresh_locked(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserStatsSnapshot> {
        let catalog = self.db.list_tree_types()?;
        let mode = self.config.stats.streak_mode;
        let max_attempts = self.config.stats.max_conflict_retries.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;

            let previous = self
                .db
                .get_snapshot(user_id)?
                .ok_or_else(|| Error::StatsNotFound(user_id.to_string()))?;
            let completed = self.db.list_completed_sessions(user_id, None)?;
            let next = recompute_snapshot(&completed, &previous, now, mode, &catalog)?;

            match self.db.save_snapshot(&next, previous.version) {
                Ok(saved) => {
                    tracing::debug!(user_id, version = saved.version, attempt, "Saved stats snapshot");
                    return Ok(saved);
                }
                Err(Error::Conflict { expected, .. }) if attempt < max_attempts => {
                    tracing::warn!(
                        user_id,
                        expected,
                        attempt,
                        "Stats snapshot changed concurrently, recomputing"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The stored snapshot.
    pub fn stats(&self, user_id: &str) -> Result<UserStatsSnapshot> {
        self.db
            .get_snapshot(user_id)?
            .ok_or_else(|| Error::StatsNotFound(user_id.to_string()))
    }

    /// A page of the user's sessions, newest first, with the user's total.
    pub fn list_sessions(&self, user_id: &str, limit: usize, offset: usize) -> Result<SessionPage> {
        self.require_user(user_id)?;
        let filter = SessionFilter {
            limit: Some(limit),
            offset: Some(offset),
            ..SessionFilter::for_user(user_id)
        };
        Ok(SessionPage {
            sessions: self.db.list_sessions(&filter)?,
            total: self.db.count_sessions(&filter)?,
            limit,
            offset,
        })
    }

    // ============================================
    // Reports
    // ============================================

    /// Daily buckets for the trailing week ending on `today`.
    pub fn weekly_report(&self, user_id: &str, today: NaiveDate) -> Result<PeriodReport> {
        self.report(user_id, ReportPeriod::Week, today)
    }

    /// Weekly buckets for the trailing month ending on `today`.
    pub fn monthly_report(&self, user_id: &str, today: NaiveDate) -> Result<PeriodReport> {
        self.report(user_id, ReportPeriod::Month, today)
    }

    pub fn report(
        &self,
        user_id: &str,
        period: ReportPeriod,
        today: NaiveDate,
    ) -> Result<PeriodReport> {
        self.require_user(user_id)?;
        let layout = match period {
            ReportPeriod::Week => self.config.reports.week_layout(),
            ReportPeriod::Month => self.config.reports.month_layout(),
        };
        let window = period.window(today, &layout);
        let sessions = self.db.list_completed_sessions(user_id, Some(window))?;
        Ok(PeriodReport::build(period, &sessions, today, &layout))
    }
}
