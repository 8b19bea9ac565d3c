//! # focusforest-core
//!
//! Core library for focusforest - a focus timer that plants a tree for every
//! completed session.
//!
//! This library provides:
//! - Domain types for users, sessions, tree types and stats snapshots
//! - The analytics engine (totals, streaks, unlocks, week/month reports)
//! - Database storage layer with SQLite
//! - The [`FocusTracker`] service that ties the two together
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through two layers:
//! - **Canonical:** users, sessions and the tree catalog in SQLite
//! - **Derived:** the per-user stats snapshot, regenerable from sessions
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use focusforest_core::{Config, Database, FocusTracker};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let tracker = FocusTracker::new(db, config);
//! let user = tracker.find_user("ada").expect("unknown user");
//! let session = tracker
//!     .start_session(&user.id, 25, None, Utc::now())
//!     .expect("failed to start session");
//! tracker
//!     .complete_session(&user.id, &session.id, None, Utc::now())
//!     .expect("failed to complete session");
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{PeriodReport, ReportPeriod, StreakMode};
pub use config::Config;
pub use db::{Database, SessionChange, SessionFilter};
pub use error::{Error, Result};
pub use tracker::{Completion, FocusTracker, SessionPage};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod tracker;
pub mod types;
