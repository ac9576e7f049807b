//! v001 -- Initial schema creation.
//!
//! Creates `view_stats`, `sessions` and `favorites`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- View statistics, one row per content slug
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS view_stats (
    slug           TEXT PRIMARY KEY NOT NULL,
    view_count     INTEGER NOT NULL DEFAULT 0,
    unique_views   INTEGER NOT NULL DEFAULT 0,
    last_viewed_at TEXT NOT NULL              -- RFC-3339, UTC, fixed width
);

CREATE INDEX IF NOT EXISTS idx_view_stats_last_viewed ON view_stats(last_viewed_at);

-- ----------------------------------------------------------------
-- Sessions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    token      TEXT PRIMARY KEY NOT NULL,
    username   TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

-- ----------------------------------------------------------------
-- Favorites
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS favorites (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    username   TEXT NOT NULL,
    slug       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_favorites_unique ON favorites(username, slug);
CREATE INDEX IF NOT EXISTS idx_favorites_slug ON favorites(slug);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
