use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::Favorite;
use crate::{from_db_time, parse_uuid, to_db_time};

impl Database {
    /// Bookmark `slug` for `username`. Adding an existing favorite is a
    /// no-op; returns `true` only when a new row was inserted.
    pub fn add_favorite(&self, username: &str, slug: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO favorites (id, username, slug, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                Uuid::new_v4().to_string(),
                username,
                slug,
                to_db_time(Utc::now()),
            ],
        )?;
        Ok(affected > 0)
    }

    pub fn remove_favorite(&self, username: &str, slug: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM favorites WHERE username = ?1 AND slug = ?2",
            params![username, slug],
        )?;
        Ok(affected > 0)
    }

    /// A reader's favorites, most recent first.
    pub fn list_favorites(&self, username: &str) -> Result<Vec<Favorite>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, username, slug, created_at
             FROM favorites
             WHERE username = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map(params![username], |row| {
            let id_str: String = row.get(0)?;
            let username: String = row.get(1)?;
            let slug: String = row.get(2)?;
            let created_str: String = row.get(3)?;

            Ok(Favorite {
                id: parse_uuid(0, &id_str)?,
                username,
                slug,
                created_at: from_db_time(3, &created_str)?,
            })
        })?;

        let mut favorites = Vec::new();
        for row in rows {
            favorites.push(row?);
        }
        Ok(favorites)
    }

    /// How many readers bookmarked `slug`.
    pub fn favorite_count(&self, slug: &str) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM favorites WHERE slug = ?1",
            params![slug],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
