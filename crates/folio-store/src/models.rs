//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be returned directly as a JSON
//! response body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ViewStat
// ---------------------------------------------------------------------------

/// Aggregate view counters for one content slug.
///
/// Both counters only ever grow. `unique_views <= view_count` always holds
/// because every unique view is also a view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ViewStat {
    pub slug: String,
    pub view_count: i64,
    pub unique_views: i64,
    pub last_viewed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A reader session, looked up by its bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

// ---------------------------------------------------------------------------
// Favorite
// ---------------------------------------------------------------------------

/// A slug bookmarked by a reader. At most one per `(username, slug)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: Uuid,
    pub username: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub slug: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
