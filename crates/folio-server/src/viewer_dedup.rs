//! Decides whether a view counts as unique.
//!
//! The popularity counters take the dedup decision as an input, so the
//! strategy is pluggable through [`ViewerDedup`]. The default
//! [`WindowedDedup`] remembers each `(slug, viewer)` pair in memory for a
//! fixed window; it is reset on restart.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

pub trait ViewerDedup: Send + Sync {
    /// Returns `true` if `viewer_key` has not been counted for `slug` within
    /// the dedup window, and remembers it as counted.
    fn first_seen(&self, slug: &str, viewer_key: &str) -> bool;

    /// Undo a `first_seen` that returned `true` but whose view was never
    /// stored, so the viewer's next report counts as unique.
    fn forget(&self, slug: &str, viewer_key: &str);

    /// Drop entries whose window has passed. Returns how many were dropped.
    fn purge_expired(&self) -> usize;
}

/// Stable, non-reversible key for a viewer: BLAKE3 of the client IP and
/// user agent.
pub fn viewer_key(ip: Option<IpAddr>, user_agent: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    match ip {
        Some(ip) => hasher.update(ip.to_string().as_bytes()),
        None => hasher.update(b"unknown"),
    };
    hasher.update(&[0]);
    hasher.update(user_agent.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// In-memory dedup with a fixed window starting at the counted view.
pub struct WindowedDedup {
    window: Duration,
    seen: Mutex<HashMap<(String, String), DateTime<Utc>>>,
}

impl WindowedDedup {
    pub fn new(window: std::time::Duration) -> Self {
        Self {
            window: Duration::from_std(window).unwrap_or_else(|_| Duration::days(1)),
            seen: Mutex::new(HashMap::new()),
        }
    }

    fn first_seen_at(&self, slug: &str, viewer_key: &str, now: DateTime<Utc>) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let key = (slug.to_string(), viewer_key.to_string());
        match seen.get(&key) {
            Some(counted_at) if now - *counted_at < self.window => false,
            _ => {
                seen.insert(key, now);
                true
            }
        }
    }

    fn remove(&self, slug: &str, viewer_key: &str) {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.remove(&(slug.to_string(), viewer_key.to_string()));
    }

    fn purge_at(&self, now: DateTime<Utc>) -> usize {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = seen.len();
        seen.retain(|_, counted_at| now - *counted_at < self.window);
        let removed = before - seen.len();
        if removed > 0 {
            debug!(removed, "Purged expired viewer dedup entries");
        }
        removed
    }
}

impl ViewerDedup for WindowedDedup {
    fn first_seen(&self, slug: &str, viewer_key: &str) -> bool {
        self.first_seen_at(slug, viewer_key, Utc::now())
    }

    fn forget(&self, slug: &str, viewer_key: &str) {
        self.remove(slug, viewer_key);
    }

    fn purge_expired(&self) -> usize {
        self.purge_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dedup(secs: u64) -> WindowedDedup {
        WindowedDedup::new(std::time::Duration::from_secs(secs))
    }

    #[test]
    fn test_repeat_within_window_not_unique() {
        let d = dedup(3600);
        assert!(d.first_seen("post", "viewer-1"));
        assert!(!d.first_seen("post", "viewer-1"));
        assert!(d.first_seen("post", "viewer-2"));
        assert!(d.first_seen("other", "viewer-1"));
    }

    #[test]
    fn test_counts_again_after_window() {
        let d = dedup(60);
        let t0 = Utc::now();
        assert!(d.first_seen_at("post", "v", t0));
        assert!(!d.first_seen_at("post", "v", t0 + Duration::seconds(59)));
        assert!(d.first_seen_at("post", "v", t0 + Duration::seconds(61)));
    }

    #[test]
    fn test_forget_allows_recount() {
        let d = dedup(3600);
        assert!(d.first_seen("post", "viewer-1"));
        assert!(d.first_seen("post", "viewer-2"));

        d.forget("post", "viewer-1");
        assert!(d.first_seen("post", "viewer-1"));
        assert!(!d.first_seen("post", "viewer-2"));
    }

    #[test]
    fn test_purge_drops_only_expired() {
        let d = dedup(60);
        let t0 = Utc::now();
        d.first_seen_at("a", "v", t0);
        d.first_seen_at("b", "v", t0 + Duration::seconds(50));

        assert_eq!(d.purge_at(t0 + Duration::seconds(70)), 1);
        assert!(!d.first_seen_at("b", "v", t0 + Duration::seconds(70)));
    }

    #[test]
    fn test_viewer_key_depends_on_ip_and_agent() {
        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        let other: IpAddr = "203.0.113.8".parse().unwrap();

        let k = viewer_key(Some(ip), "Firefox");
        assert_eq!(k, viewer_key(Some(ip), "Firefox"));
        assert_ne!(k, viewer_key(Some(other), "Firefox"));
        assert_ne!(k, viewer_key(Some(ip), "Chrome"));
        assert_ne!(k, viewer_key(None, "Firefox"));
        assert_eq!(k.len(), 64);
    }
}
