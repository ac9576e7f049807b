//! View counters and the popularity query.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::ViewStat;
use crate::{from_db_time, to_db_time};

impl Database {
    /// Count one view of `slug`.
    ///
    /// `view_count` always grows by one; `unique_views` grows only when
    /// `first_seen` is set (the caller's dedup decided this viewer is new for
    /// the slug). The row is created on the first view. The whole update is
    /// one statement, so concurrent calls never lose increments.
    pub fn record_view(&self, slug: &str, first_seen: bool) -> Result<ViewStat> {
        let now = Utc::now();
        let stat = self.conn().query_row(
            "INSERT INTO view_stats (slug, view_count, unique_views, last_viewed_at)
             VALUES (?1, 1, ?2, ?3)
             ON CONFLICT(slug) DO UPDATE SET
                 view_count     = view_count + 1,
                 unique_views   = unique_views + excluded.unique_views,
                 last_viewed_at = excluded.last_viewed_at
             RETURNING slug, view_count, unique_views, last_viewed_at",
            params![slug, i64::from(first_seen), to_db_time(now)],
            row_to_view_stat,
        )?;

        tracing::debug!(
            slug,
            first_seen,
            view_count = stat.view_count,
            unique_views = stat.unique_views,
            "recorded view"
        );
        Ok(stat)
    }

    /// Counters for a single slug.
    pub fn get_view_stat(&self, slug: &str) -> Result<ViewStat> {
        self.conn()
            .query_row(
                "SELECT slug, view_count, unique_views, last_viewed_at
                 FROM view_stats
                 WHERE slug = ?1",
                params![slug],
                row_to_view_stat,
            )
            .optional()?
            .ok_or(StoreError::NotFound)
    }

    /// The `limit` most viewed slugs among those viewed in the last
    /// `window_days` days, or among all slugs when `window_days <= 0` or the
    /// window reaches past the earliest representable instant.
    ///
    /// Ordered by `view_count` descending; equal counts are ordered by slug
    /// ascending so the result is stable.
    pub fn get_popular(&self, limit: u32, window_days: i64) -> Result<Vec<ViewStat>> {
        let cutoff = if window_days > 0 {
            Duration::try_days(window_days).and_then(|window| Utc::now().checked_sub_signed(window))
        } else {
            None
        };
        self.get_popular_since(limit, cutoff)
    }

    /// Same as [`Database::get_popular`] with an explicit cutoff instant.
    pub fn get_popular_since(
        &self,
        limit: u32,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<Vec<ViewStat>> {
        let mut stmt = self.conn().prepare(
            "SELECT slug, view_count, unique_views, last_viewed_at
             FROM view_stats
             WHERE (?1 IS NULL OR last_viewed_at >= ?1)
             ORDER BY view_count DESC, slug ASC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(
            params![cutoff.map(to_db_time), i64::from(limit)],
            row_to_view_stat,
        )?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(row?);
        }
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_view_stat(row: &rusqlite::Row<'_>) -> rusqlite::Result<ViewStat> {
    let slug: String = row.get(0)?;
    let view_count: i64 = row.get(1)?;
    let unique_views: i64 = row.get(2)?;
    let last_str: String = row.get(3)?;

    Ok(ViewStat {
        slug,
        view_count,
        unique_views,
        last_viewed_at: from_db_time(3, &last_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Insert a row directly, bypassing `record_view`.
    fn seed(db: &Database, slug: &str, views: i64, last_viewed_at: DateTime<Utc>) {
        db.conn()
            .execute(
                "INSERT INTO view_stats (slug, view_count, unique_views, last_viewed_at)
                 VALUES (?1, ?2, ?2, ?3)",
                params![slug, views, to_db_time(last_viewed_at)],
            )
            .unwrap();
    }

    fn slugs(stats: &[ViewStat]) -> Vec<&str> {
        stats.iter().map(|s| s.slug.as_str()).collect()
    }

    #[test]
    fn test_first_view_creates_row() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_view_stat("hello"), Err(StoreError::NotFound)));

        let stat = db.record_view("hello", true).unwrap();
        assert_eq!(stat.view_count, 1);
        assert_eq!(stat.unique_views, 1);
        assert_eq!(db.get_view_stat("hello").unwrap(), stat);
    }

    #[test]
    fn test_repeat_viewer_counts_once_as_unique() {
        let db = Database::open_in_memory().unwrap();
        db.record_view("post", true).unwrap();
        let stat = db.record_view("post", false).unwrap();

        assert_eq!(stat.view_count, 2);
        assert_eq!(stat.unique_views, 1);
    }

    #[test]
    fn test_last_viewed_at_advances() {
        let db = Database::open_in_memory().unwrap();
        let first = db.record_view("post", true).unwrap();
        let second = db.record_view("post", false).unwrap();
        assert!(second.last_viewed_at >= first.last_viewed_at);
    }

    #[test]
    fn test_popular_orders_by_count() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        seed(&db, "a", 10, now);
        seed(&db, "b", 5, now);
        seed(&db, "c", 20, now);

        let popular = db.get_popular(2, 30).unwrap();
        assert_eq!(slugs(&popular), vec!["c", "a"]);
    }

    #[test]
    fn test_popular_ties_broken_by_slug() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        seed(&db, "zeta", 7, now);
        seed(&db, "alpha", 7, now);
        seed(&db, "mid", 7, now);

        let popular = db.get_popular(10, 30).unwrap();
        assert_eq!(slugs(&popular), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_popular_respects_window() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        seed(&db, "old", 100, now - Duration::days(45));
        seed(&db, "fresh", 3, now - Duration::days(2));

        assert_eq!(slugs(&db.get_popular(10, 30).unwrap()), vec!["fresh"]);
        assert_eq!(slugs(&db.get_popular(10, 0).unwrap()), vec!["old", "fresh"]);
        assert_eq!(slugs(&db.get_popular(10, -1).unwrap()), vec!["old", "fresh"]);
    }

    #[test]
    fn test_popular_huge_window_is_all_time() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        seed(&db, "old", 100, now - Duration::days(3650));
        seed(&db, "fresh", 3, now);

        for days in [9_999_999_999, i64::MAX] {
            assert_eq!(slugs(&db.get_popular(10, days).unwrap()), vec!["old", "fresh"]);
        }
    }

    #[test]
    fn test_popular_zero_limit() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "a", 1, Utc::now());
        assert!(db.get_popular(0, 30).unwrap().is_empty());
    }
}
