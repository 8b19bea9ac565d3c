//! Database repository layer
//!
//! Provides query and insert operations for all entity types.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed width
//! (`2024-02-01T18:45:00.000000Z`) so that lexical order equals time order
//! and day ranges can be expressed as plain string comparisons.

use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Midnight at the start of `day`, in storage format.
fn day_start(day: NaiveDate) -> String {
    format!("{}T00:00:00", day.format(DATE_FORMAT))
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn parse_ts(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable foreign keys and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.connection();
        super::schema::run_migrations(&conn)
    }

    /// Schema version recorded in the database file
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.connection();
        super::schema::get_schema_version(&conn)
    }

    /// Get the underlying connection (for advanced use)
    ///
    /// A panic while the lock was held leaves SQLite itself consistent, so
    /// a poisoned lock is recovered rather than propagated.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================
    // User operations
    // ============================================

    /// Insert a user together with its initial stats snapshot
    pub fn create_user(&self, user: &User) -> Result<UserStatsSnapshot> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;

        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            [&user.username],
            |r| r.get(0),
        )?;
        if taken {
            return Err(Error::UserExists(user.username.clone()));
        }

        tx.execute(
            "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)",
            params![user.id, user.username, format_ts(&user.created_at)],
        )?;

        let snapshot = UserStatsSnapshot::new(user.id.clone());
        tx.execute(
            "INSERT INTO user_stats (user_id, unlocked_trees, version) VALUES (?1, ?2, ?3)",
            params![
                snapshot.user_id,
                serde_json::to_string(&snapshot.unlocked_trees)?,
                snapshot.version,
            ],
        )?;

        tx.commit()?;
        tracing::info!(user_id = %user.id, username = %user.username, "Created user");
        Ok(snapshot)
    }

    /// Get a user by ID
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT id, username, created_at FROM users WHERE id = ?",
            [id],
            Self::row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Get a user by username
    pub fn get_user_by_name(&self, username: &str) -> Result<Option<User>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT id, username, created_at FROM users WHERE username = ?",
            [username],
            Self::row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    /// List all users ordered by creation time
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.connection();
        let mut stmt =
            conn.prepare("SELECT id, username, created_at FROM users ORDER BY created_at, username")?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn row_to_user(row: &Row) -> rusqlite::Result<User> {
        let created_at: String = row.get(2)?;
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            created_at: parse_ts(2, &created_at)?,
        })
    }

    // ============================================
    // Session operations
    // ============================================

    /// Insert a new session
    pub fn insert_session(&self, session: &FocusSession) -> Result<()> {
        let conn = self.connection();
        conn.execute(
            r#"
            INSERT INTO focus_sessions (id, user_id, tree_type_id, duration_minutes, completed,
                                        started_at, ended_at, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                session.id,
                session.owner_id,
                session.tree_type_id,
                session.duration_minutes,
                session.completed,
                format_ts(&session.started_at),
                session.ended_at.as_ref().map(format_ts),
                session.notes,
            ],
        )?;
        Ok(())
    }

    /// Get a session by ID
    pub fn get_session(&self, id: &str) -> Result<Option<FocusSession>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT * FROM focus_sessions WHERE id = ?",
            [id],
            Self::row_to_session,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Persist the pending→completed transition of `session`.
    ///
    /// Only a pending row is updated, so a session can never be completed
    /// twice even by concurrent callers.
    fn mark_completed_on(conn: &Connection, session: &FocusSession) -> Result<()> {
        let Some(ended_at) = session.ended_at.as_ref() else {
            return Err(Error::InvalidInput(format!(
                "session {} has no ended_at",
                session.id
            )));
        };

        let updated = conn.execute(
            r#"
            UPDATE focus_sessions
            SET completed = 1, ended_at = ?2, notes = ?3
            WHERE id = ?1 AND completed = 0
            "#,
            params![session.id, format_ts(ended_at), session.notes],
        )?;

        if updated == 0 {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM focus_sessions WHERE id = ?1)",
                [&session.id],
                |r| r.get(0),
            )?;
            return Err(if exists {
                Error::AlreadyCompleted(session.id.clone())
            } else {
                Error::SessionNotFound(session.id.clone())
            });
        }
        Ok(())
    }

    /// Delete a session. Returns false if it did not exist.
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        let conn = self.connection();
        let deleted = conn.execute("DELETE FROM focus_sessions WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    /// Apply `change` and save the snapshot that `recompute` derives from
    /// the resulting completed history, in one transaction.
    ///
    /// `recompute` receives the owner's completed sessions in end order and
    /// the stored snapshot. If any step fails the session row and the
    /// snapshot are both left as they were.
    pub fn commit_session_change<F>(
        &self,
        change: SessionChange<'_>,
        recompute: F,
    ) -> Result<UserStatsSnapshot>
    where
        F: FnOnce(&[FocusSession], &UserStatsSnapshot) -> Result<UserStatsSnapshot>,
    {
        let mut conn = self.connection();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let owner = match change {
            SessionChange::Complete(session) => {
                Self::mark_completed_on(&tx, session)?;
                &session.owner_id
            }
            SessionChange::Delete(session) => {
                let deleted = tx.execute("DELETE FROM focus_sessions WHERE id = ?", [&session.id])?;
                if deleted == 0 {
                    return Err(Error::SessionNotFound(session.id.clone()));
                }
                &session.owner_id
            }
        };

        let previous = Self::snapshot_on(&tx, owner)?
            .ok_or_else(|| Error::StatsNotFound(owner.clone()))?;
        let completed =
            Self::select_sessions(&tx, &SessionFilter::completed_for(owner, None), "ended_at ASC")?;
        let next = recompute(&completed, &previous)?;
        let saved = Self::save_snapshot_on(&tx, &next, previous.version)?;

        tx.commit()?;
        Ok(saved)
    }

    /// List sessions, newest first
    pub fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<FocusSession>> {
        self.query_sessions(filter, "started_at DESC")
    }

    /// List a user's completed sessions ordered by completion time.
    ///
    /// `days` restricts the result to sessions whose end day lies in the
    /// inclusive range.
    pub fn list_completed_sessions(
        &self,
        user_id: &str,
        days: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<FocusSession>> {
        self.query_sessions(&SessionFilter::completed_for(user_id, days), "ended_at ASC")
    }

    /// Count sessions matching a filter (ignores limit/offset)
    pub fn count_sessions(&self, filter: &SessionFilter) -> Result<i64> {
        let (where_sql, params) = filter.where_clause();
        let sql = format!("SELECT COUNT(*) FROM focus_sessions{}", where_sql);
        let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let conn = self.connection();
        let count = conn.query_row(&sql, params_refs.as_slice(), |r| r.get(0))?;
        Ok(count)
    }

    fn query_sessions(&self, filter: &SessionFilter, order_by: &str) -> Result<Vec<FocusSession>> {
        let conn = self.connection();
        Self::select_sessions(&conn, filter, order_by)
    }

    fn select_sessions(
        conn: &Connection,
        filter: &SessionFilter,
        order_by: &str,
    ) -> Result<Vec<FocusSession>> {
        let (where_sql, params) = filter.where_clause();
        let mut sql = format!(
            "SELECT * FROM focus_sessions{} ORDER BY {}, id",
            where_sql, order_by
        );

        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = filter.offset {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }

        let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(params_refs.as_slice(), Self::row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    fn row_to_session(row: &Row) -> rusqlite::Result<FocusSession> {
        let started_at: String = row.get("started_at")?;
        let ended_at: Option<String> = row.get("ended_at")?;

        Ok(FocusSession {
            id: row.get("id")?,
            owner_id: row.get("user_id")?,
            duration_minutes: row.get("duration_minutes")?,
            completed: row.get("completed")?,
            started_at: parse_ts(0, &started_at)?,
            ended_at: ended_at.as_deref().map(|s| parse_ts(0, s)).transpose()?,
            notes: row.get("notes")?,
            tree_type_id: row.get("tree_type_id")?,
        })
    }

    // ============================================
    // Stats snapshot operations
    // ============================================

    /// Get the stats snapshot of a user
    pub fn get_snapshot(&self, user_id: &str) -> Result<Option<UserStatsSnapshot>> {
        let conn = self.connection();
        Self::snapshot_on(&conn, user_id)
    }

    fn snapshot_on(conn: &Connection, user_id: &str) -> Result<Option<UserStatsSnapshot>> {
        conn.query_row(
            "SELECT * FROM user_stats WHERE user_id = ?",
            [user_id],
            Self::row_to_snapshot,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Replace a snapshot if nobody saved it since `expected_version`.
    ///
    /// Returns the stored snapshot with its bumped version, or
    /// [`Error::Conflict`] when the stored version has moved on.
    pub fn save_snapshot(
        &self,
        snapshot: &UserStatsSnapshot,
        expected_version: i64,
    ) -> Result<UserStatsSnapshot> {
        let conn = self.connection();
        Self::save_snapshot_on(&conn, snapshot, expected_version)
    }

    fn save_snapshot_on(
        conn: &Connection,
        snapshot: &UserStatsSnapshot,
        expected_version: i64,
    ) -> Result<UserStatsSnapshot> {
        let unlocked = serde_json::to_string(&snapshot.unlocked_trees)?;
        let updated = conn.execute(
            r#"
            UPDATE user_stats
            SET total_sessions = ?2,
                total_minutes = ?3,
                trees_planted = ?4,
                current_streak = ?5,
                longest_streak = ?6,
                last_session_date = ?7,
                unlocked_trees = ?8,
                updated_at = ?9,
                version = version + 1
            WHERE user_id = ?1 AND version = ?10
            "#,
            params![
                snapshot.user_id,
                snapshot.total_sessions,
                snapshot.total_minutes,
                snapshot.trees_planted,
                snapshot.current_streak,
                snapshot.longest_streak,
                snapshot
                    .last_session_date
                    .map(|d| d.format(DATE_FORMAT).to_string()),
                unlocked,
                snapshot.updated_at.as_ref().map(format_ts),
                expected_version,
            ],
        )?;

        if updated == 0 {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM user_stats WHERE user_id = ?1)",
                [&snapshot.user_id],
                |r| r.get(0),
            )?;
            return Err(if exists {
                Error::Conflict {
                    user_id: snapshot.user_id.clone(),
                    expected: expected_version,
                }
            } else {
                Error::StatsNotFound(snapshot.user_id.clone())
            });
        }

        let mut saved = snapshot.clone();
        saved.version = expected_version + 1;
        Ok(saved)
    }

    fn row_to_snapshot(row: &Row) -> rusqlite::Result<UserStatsSnapshot> {
        let last_session_date: Option<String> = row.get("last_session_date")?;
        let unlocked: String = row.get("unlocked_trees")?;
        let updated_at: Option<String> = row.get("updated_at")?;

        Ok(UserStatsSnapshot {
            user_id: row.get("user_id")?,
            total_sessions: row.get("total_sessions")?,
            total_minutes: row.get("total_minutes")?,
            trees_planted: row.get("trees_planted")?,
            current_streak: row.get("current_streak")?,
            longest_streak: row.get("longest_streak")?,
            last_session_date: last_session_date
                .as_deref()
                .map(|s| NaiveDate::parse_from_str(s, DATE_FORMAT))
                .transpose()
                .map_err(|e| conversion_error(0, e))?,
            unlocked_trees: serde_json::from_str(&unlocked).map_err(|e| conversion_error(0, e))?,
            version: row.get("version")?,
            updated_at: updated_at.as_deref().map(|s| parse_ts(0, s)).transpose()?,
        })
    }

    // ============================================
    // Tree catalog operations
    // ============================================

    /// All tree types, cheapest first
    pub fn list_tree_types(&self) -> Result<Vec<TreeType>> {
        let conn = self.connection();
        let mut stmt =
            conn.prepare("SELECT * FROM tree_types ORDER BY unlock_requirement, name")?;
        let trees = stmt
            .query_map([], Self::row_to_tree_type)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(trees)
    }

    /// Look a tree type up by ID or by name
    pub fn get_tree_type(&self, key: &str) -> Result<Option<TreeType>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT * FROM tree_types WHERE id = ?1 OR name = ?1",
            [key],
            Self::row_to_tree_type,
        )
        .optional()
        .map_err(Error::from)
    }

    fn row_to_tree_type(row: &Row) -> rusqlite::Result<TreeType> {
        let rarity: String = row.get("rarity")?;
        Ok(TreeType {
            id: row.get("id")?,
            name: row.get("name")?,
            display_name: row.get("display_name")?,
            description: row.get("description")?,
            rarity: rarity.parse().map_err(|e| conversion_error(4, e))?,
            unlock_requirement: row.get("unlock_requirement")?,
            color: row.get("color")?,
        })
    }
}

/// A history change committed together with the snapshot that reflects it
#[derive(Debug, Clone, Copy)]
pub enum SessionChange<'a> {
    /// Persist the pending→completed transition of this session
    Complete(&'a FocusSession),
    /// Remove this session
    Delete(&'a FocusSession),
}

/// Filter for listing sessions
#[derive(Debug, Default, Clone)]
pub struct SessionFilter {
    /// Filter by owner
    pub user_id: Option<String>,
    /// Filter by completion state
    pub completed: Option<bool>,
    /// Only sessions whose end day lies in this inclusive range
    pub ended_between: Option<(NaiveDate, NaiveDate)>,
    /// Maximum number of sessions to return
    pub limit: Option<usize>,
    /// Number of sessions to skip (only applied together with `limit`)
    pub offset: Option<usize>,
}

impl SessionFilter {
    /// All sessions of one user
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    /// Completed sessions of one user, optionally by end day
    fn completed_for(user_id: &str, days: Option<(NaiveDate, NaiveDate)>) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            completed: Some(true),
            ended_between: days,
            ..Default::default()
        }
    }

    fn where_clause(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut sql = String::from(" WHERE 1=1");
        let mut params: Vec<Box<dyn ToSql>> = vec![];

        if let Some(user_id) = &self.user_id {
            sql.push_str(" AND user_id = ?");
            params.push(Box::new(user_id.clone()));
        }

        if let Some(completed) = self.completed {
            sql.push_str(" AND completed = ?");
            params.push(Box::new(completed));
        }

        if let Some((from, to)) = self.ended_between {
            sql.push_str(" AND ended_at >= ? AND ended_at < ?");
            params.push(Box::new(day_start(from)));
            params.push(Box::new(day_start(to + Duration::days(1))));
        }

        (sql, params)
    }
}
