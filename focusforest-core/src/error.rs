//! Error types for focusforest-core

use thiserror::Error;

/// Main error type for the focusforest-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Input rejected at the engine boundary; nothing was persisted
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// User not found
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Username already taken
    #[error("user already exists: {0}")]
    UserExists(String),

    /// Session not found (or not owned by the caller)
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Session was already completed
    #[error("session already completed: {0}")]
    AlreadyCompleted(String),

    /// Tree type not found
    #[error("tree type not found: {0}")]
    TreeTypeNotFound(String),

    /// Stats snapshot missing for a user
    #[error("stats not found for user: {0}")]
    StatsNotFound(String),

    /// Snapshot was written by someone else since it was read
    #[error("stats for user {user_id} changed concurrently (expected version {expected})")]
    Conflict { user_id: String, expected: i64 },
}

/// Result type alias for focusforest-core
pub type Result<T> = std::result::Result<T, Error>;
