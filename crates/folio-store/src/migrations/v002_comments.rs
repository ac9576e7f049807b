use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Comments table
CREATE TABLE IF NOT EXISTS comments (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    slug       TEXT NOT NULL,
    author     TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL               -- ISO-8601
);

CREATE INDEX IF NOT EXISTS idx_comments_slug_created ON comments(slug, created_at);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
