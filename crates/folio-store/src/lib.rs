//! # folio-store
//!
//! Relational storage for Folio, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for view statistics,
//! sessions, favorites and comments. Uniqueness rules (one favorite per
//! reader and slug, one session per token) are enforced by the schema.

pub mod comments;
pub mod database;
pub mod favorites;
pub mod migrations;
pub mod models;
pub mod sessions;
pub mod views;

mod error;

use chrono::{DateTime, SecondsFormat, Utc};

pub use database::Database;
pub use error::StoreError;
pub use models::*;

/// Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
/// so that SQL string comparison orders them chronologically.
pub(crate) fn to_db_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn from_db_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn parse_uuid(idx: usize, raw: &str) -> rusqlite::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
