//! Database layer for focusforest
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for queries
//! - Versioned snapshot writes for per-user optimistic concurrency

pub mod repo;
pub mod schema;

pub use repo::{Database, SessionChange, SessionFilter};
