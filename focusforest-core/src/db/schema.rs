//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: users, sessions, stats snapshots, tree catalog
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id               TEXT PRIMARY KEY,
        username         TEXT NOT NULL UNIQUE,
        created_at       DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tree_types (
        id                 TEXT PRIMARY KEY,
        name               TEXT NOT NULL UNIQUE,
        display_name       TEXT NOT NULL,
        description        TEXT,
        rarity             TEXT NOT NULL DEFAULT 'common',
        unlock_requirement INTEGER NOT NULL DEFAULT 0,
        color              TEXT NOT NULL DEFAULT '#22c55e'
    );

    CREATE TABLE IF NOT EXISTS focus_sessions (
        id               TEXT PRIMARY KEY,
        user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        tree_type_id     TEXT REFERENCES tree_types(id),
        duration_minutes INTEGER NOT NULL CHECK (duration_minutes BETWEEN 1 AND 180),
        completed        INTEGER NOT NULL DEFAULT 0,
        started_at       DATETIME NOT NULL,
        ended_at         DATETIME,
        notes            TEXT,

        -- ended_at is present iff the session is completed
        CHECK ((completed = 0 AND ended_at IS NULL) OR (completed = 1 AND ended_at IS NOT NULL))
    );

    -- ============================================
    -- Derived (regenerable from focus_sessions)
    -- ============================================

    CREATE TABLE IF NOT EXISTS user_stats (
        user_id           TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
        total_sessions    INTEGER NOT NULL DEFAULT 0,
        total_minutes     INTEGER NOT NULL DEFAULT 0,
        trees_planted     INTEGER NOT NULL DEFAULT 0,
        current_streak    INTEGER NOT NULL DEFAULT 0,
        longest_streak    INTEGER NOT NULL DEFAULT 0,
        last_session_date DATE,
        unlocked_trees    JSON NOT NULL DEFAULT '[]',
        version           INTEGER NOT NULL DEFAULT 0,
        updated_at        DATETIME,

        CHECK (longest_streak >= current_streak)
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_user_started ON focus_sessions(user_id, started_at DESC);
    CREATE INDEX IF NOT EXISTS idx_sessions_user_ended ON focus_sessions(user_id, completed, ended_at);
    "#,
    // Version 2: default tree catalog
    r#"
    INSERT OR IGNORE INTO tree_types (id, name, display_name, description, rarity, unlock_requirement, color) VALUES
        ('tree-pine',    'pine',    'Pine Tree',      'A classic evergreen tree, perfect for beginners', 'common',    0,   '#22c55e'),
        ('tree-oak',     'oak',     'Oak Tree',       'Strong and majestic, symbolizing wisdom',          'common',    5,   '#16a34a'),
        ('tree-sakura',  'sakura',  'Cherry Blossom', 'Delicate pink blossoms representing beauty',       'uncommon',  15,  '#ec4899'),
        ('tree-bamboo',  'bamboo',  'Bamboo',         'Fast-growing and resilient',                       'uncommon',  25,  '#059669'),
        ('tree-maple',   'maple',   'Maple Tree',     'Beautiful autumn colors',                          'rare',      50,  '#dc2626'),
        ('tree-willow',  'willow',  'Willow Tree',    'Graceful and serene',                              'rare',      75,  '#65a30d'),
        ('tree-bonsai',  'bonsai',  'Bonsai Tree',    'Miniature masterpiece of patience',                'epic',      100, '#0891b2'),
        ('tree-ancient', 'ancient', 'Ancient Tree',   'Legendary tree of focus mastery',                  'legendary', 200, '#7c3aed');
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version = get_schema_version(conn)?;

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
