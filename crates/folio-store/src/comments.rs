//! CRUD operations for [`Comment`] records.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::Comment;
use crate::{from_db_time, parse_uuid, to_db_time};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Store a comment. Length and emptiness checks belong to the caller.
    pub fn add_comment(&self, slug: &str, author: &str, body: &str) -> Result<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            author: author.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO comments (id, slug, author, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                comment.id.to_string(),
                comment.slug,
                comment.author,
                comment.body,
                to_db_time(comment.created_at),
            ],
        )?;

        Ok(comment)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Comments on `slug`, oldest first.
    pub fn list_comments(&self, slug: &str) -> Result<Vec<Comment>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, slug, author, body, created_at
             FROM comments
             WHERE slug = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![slug], row_to_comment)?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a comment by id. Returns `true` if a row was deleted.
    pub fn delete_comment(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM comments WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let id_str: String = row.get(0)?;
    let slug: String = row.get(1)?;
    let author: String = row.get(2)?;
    let body: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    Ok(Comment {
        id: parse_uuid(0, &id_str)?,
        slug,
        author,
        body,
        created_at: from_db_time(4, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_listed_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        db.add_comment("post", "ana", "first!").unwrap();
        db.add_comment("post", "ben", "second").unwrap();
        db.add_comment("other", "ana", "elsewhere").unwrap();

        let comments = db.list_comments("post").unwrap();
        let bodies: Vec<_> = comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["first!", "second"]);
    }

    #[test]
    fn test_delete_comment() {
        let db = Database::open_in_memory().unwrap();
        let comment = db.add_comment("post", "ana", "oops").unwrap();

        assert!(db.delete_comment(comment.id).unwrap());
        assert!(db.list_comments("post").unwrap().is_empty());
    }
}
