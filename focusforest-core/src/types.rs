//! Core domain types for focusforest
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **User** | The owner of sessions and of exactly one stats snapshot |
//! | **FocusSession** | One timed interval; pending until completed, completion is terminal |
//! | **Snapshot** | The persisted lifetime summary of a user's completed sessions |
//! | **TreeType** | A cosmetic reward unlocked by planting enough trees |
//!
//! Calendar days are computed by truncating UTC timestamps. There is no
//! per-user timezone.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tree every new user starts with.
pub const DEFAULT_TREE: &str = "pine";

/// Shortest accepted focus session, in minutes.
pub const MIN_DURATION_MINUTES: u32 = 1;

/// Longest accepted focus session, in minutes.
pub const MAX_DURATION_MINUTES: u32 = 180;

// ============================================
// User
// ============================================

/// Someone who plants trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Unique display name
    pub username: String,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a fresh id.
    pub fn new(username: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            created_at,
        }
    }
}

// ============================================
// Focus Session
// ============================================

/// A single focus interval.
///
/// A session is either pending (`completed == false`, no `ended_at`) or
/// completed (`completed == true`, `ended_at` set). The transition happens
/// once and is never undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSession {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Owning user
    pub owner_id: String,
    /// Planned length in minutes (1-180)
    pub duration_minutes: u32,
    /// Whether the session ran to completion
    pub completed: bool,
    /// When the session was created
    pub started_at: DateTime<Utc>,
    /// When the session was completed
    pub ended_at: Option<DateTime<Utc>>,
    /// Free-form notes added on completion
    pub notes: Option<String>,
    /// Tree planted by this session, if one was chosen
    pub tree_type_id: Option<String>,
}

impl FocusSession {
    /// Create a pending session.
    pub fn new(
        owner_id: impl Into<String>,
        duration_minutes: u32,
        tree_type_id: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            duration_minutes,
            completed: false,
            started_at,
            ended_at: None,
            notes: None,
            tree_type_id,
        }
    }

    /// True while the session has not been completed.
    pub fn is_pending(&self) -> bool {
        !self.completed
    }

    /// Calendar day the session ended on.
    pub fn end_day(&self) -> Option<NaiveDate> {
        self.ended_at.map(|t| t.date_naive())
    }

    /// Mark the session completed at `at`.
    ///
    /// Notes are only replaced when new ones are supplied.
    pub fn complete(&mut self, at: DateTime<Utc>, notes: Option<String>) -> Result<()> {
        if self.completed {
            return Err(Error::AlreadyCompleted(self.id.clone()));
        }
        self.completed = true;
        self.ended_at = Some(at);
        if notes.is_some() {
            self.notes = notes;
        }
        Ok(())
    }
}

// ============================================
// Tree Types
// ============================================

/// How rare a tree is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeRarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl TreeRarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeRarity::Common => "common",
            TreeRarity::Uncommon => "uncommon",
            TreeRarity::Rare => "rare",
            TreeRarity::Epic => "epic",
            TreeRarity::Legendary => "legendary",
        }
    }
}

impl std::str::FromStr for TreeRarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "common" => Ok(TreeRarity::Common),
            "uncommon" => Ok(TreeRarity::Uncommon),
            "rare" => Ok(TreeRarity::Rare),
            "epic" => Ok(TreeRarity::Epic),
            "legendary" => Ok(TreeRarity::Legendary),
            _ => Err(Error::InvalidInput(format!("unknown tree rarity: {}", s))),
        }
    }
}

/// A cosmetic reward category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeType {
    /// Unique identifier
    pub id: String,
    /// Unique short name (e.g. "pine")
    pub name: String,
    /// Human-friendly name (e.g. "Pine Tree")
    pub display_name: String,
    /// Flavor text
    pub description: Option<String>,
    /// Rarity tier
    pub rarity: TreeRarity,
    /// Trees planted before this one unlocks
    pub unlock_requirement: i64,
    /// Display color as a hex string
    pub color: String,
}

// ============================================
// Stats Snapshot
// ============================================

/// Per-user lifetime summary derived from completed sessions.
///
/// `longest_streak >= current_streak` always holds. `unlocked_trees` only
/// ever grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatsSnapshot {
    /// Owning user
    pub user_id: String,
    /// Number of completed sessions
    pub total_sessions: i64,
    /// Sum of completed session durations
    pub total_minutes: i64,
    /// Trees planted (one per completed session)
    pub trees_planted: i64,
    /// Consecutive days with a completion, ending at `last_session_date`
    pub current_streak: i64,
    /// Best streak ever recorded
    pub longest_streak: i64,
    /// Calendar day of the most recent completion
    pub last_session_date: Option<NaiveDate>,
    /// Tree names unlocked so far, in unlock order
    pub unlocked_trees: Vec<String>,
    /// Optimistic concurrency counter, bumped by every save
    pub version: i64,
    /// When the snapshot was last saved
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserStatsSnapshot {
    /// The snapshot a freshly created user starts with.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            total_sessions: 0,
            total_minutes: 0,
            trees_planted: 0,
            current_streak: 0,
            longest_streak: 0,
            last_session_date: None,
            unlocked_trees: vec![DEFAULT_TREE.to_string()],
            version: 0,
            updated_at: None,
        }
    }

    /// Format total minutes for display (e.g., "12h 5m").
    pub fn duration_display(&self) -> String {
        let hours = self.total_minutes / 60;
        let mins = self.total_minutes % 60;
        if hours > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}m", mins)
        }
    }
}
