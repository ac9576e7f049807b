//! Reader sessions.

use chrono::{Duration, Utc};
use rusqlite::{params, OptionalExtension};

use folio_shared::session::SessionClaims;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Session;
use crate::{from_db_time, to_db_time};

impl Database {
    /// Persist a session for freshly issued `claims`, valid for `ttl`.
    pub fn create_session(&self, claims: &SessionClaims, ttl: Duration) -> Result<Session> {
        let session = Session {
            token: claims.encode(),
            username: claims.username.clone(),
            created_at: claims.issued_at,
            expires_at: claims.issued_at + ttl,
        };

        self.conn().execute(
            "INSERT INTO sessions (token, username, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.token,
                session.username,
                to_db_time(session.created_at),
                to_db_time(session.expires_at),
            ],
        )?;

        Ok(session)
    }

    /// Resolve a bearer token. Expired sessions are reported as
    /// [`StoreError::SessionExpired`] and left for the purge task.
    pub fn get_session(&self, token: &str) -> Result<Session> {
        let session = self
            .conn()
            .query_row(
                "SELECT token, username, created_at, expires_at
                 FROM sessions
                 WHERE token = ?1",
                params![token],
                row_to_session,
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;

        if session.is_expired() {
            return Err(StoreError::SessionExpired);
        }
        Ok(session)
    }

    /// End a session. Returns `true` if a row was deleted.
    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(affected > 0)
    }

    /// Remove every expired session, returning how many were removed.
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![to_db_time(Utc::now())],
        )?;
        Ok(affected)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let token: String = row.get(0)?;
    let username: String = row.get(1)?;
    let created_str: String = row.get(2)?;
    let expires_str: String = row.get(3)?;

    Ok(Session {
        token,
        username,
        created_at: from_db_time(2, &created_str)?,
        expires_at: from_db_time(3, &expires_str)?,
    })
}
