//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use folio_shared::constants::{DATABASE_FILE, DEFAULT_DEDUP_WINDOW_SECS, DEFAULT_HTTP_PORT};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Directory holding `metadata.json`, `history/`, the catalog files and
    /// (by default) the SQLite database.
    /// Env: `DATA_DIR`
    /// Default: `./data`
    pub data_dir: PathBuf,

    /// Directory holding `posts/*.md` and `categories.json`.
    /// Env: `CONTENT_DIR`
    /// Default: `./content`
    pub content_dir: PathBuf,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `<DATA_DIR>/folio.db`
    pub database_path: PathBuf,

    /// Admin API bearer token. Required to access /api/admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,

    /// Window during which repeat views from one viewer are not unique.
    /// Env: `VIEW_DEDUP_WINDOW_SECS`
    /// Default: `86400`
    pub view_dedup_window_secs: u64,

    /// Lifetime of reader sessions.
    /// Env: `SESSION_TTL_DAYS`
    /// Default: `30`
    pub session_ttl_days: i64,

    /// Hosts the file proxy may fetch from (exact host or any subdomain).
    /// Env: `PROXY_ALLOWED_HOSTS` (comma separated)
    /// Default: empty (proxy disabled).
    pub proxy_allowed_hosts: Vec<String>,

    /// Largest upstream body the proxy will relay.
    /// Env: `PROXY_MAX_BYTES`
    /// Default: 10 MiB
    pub proxy_max_bytes: usize,

    /// Sustained requests per second allowed per client IP.
    /// Env: `RATE_LIMIT_PER_SEC`
    /// Default: `10`
    pub rate_limit_per_sec: f64,

    /// Burst size per client IP.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: `30`
    pub rate_limit_burst: f64,

    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a reverse proxy that overwrites these headers;
    /// otherwise any client can pick its own address, dodging the rate
    /// limit and inflating unique views.
    /// Env: `TRUST_PROXY_HEADERS`
    /// Default: `false` (socket peer address only).
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("./data");
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: data_dir.join(DATABASE_FILE),
            data_dir,
            content_dir: PathBuf::from("./content"),
            admin_token: None,
            view_dedup_window_secs: DEFAULT_DEDUP_WINDOW_SECS,
            session_ttl_days: 30,
            proxy_allowed_hosts: Vec::new(),
            proxy_max_bytes: 10 * 1024 * 1024, // 10 MiB
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
            trust_proxy_headers: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            parse_into(&mut config.http_addr, "HTTP_ADDR", &addr);
        }

        if let Some(dir) = lookup("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
            config.database_path = config.data_dir.join(DATABASE_FILE);
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(dir) = lookup("CONTENT_DIR") {
            config.content_dir = PathBuf::from(dir);
        }

        if let Some(token) = lookup("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        if let Some(val) = lookup("VIEW_DEDUP_WINDOW_SECS") {
            parse_into(&mut config.view_dedup_window_secs, "VIEW_DEDUP_WINDOW_SECS", &val);
        }

        if let Some(val) = lookup("SESSION_TTL_DAYS") {
            parse_into(&mut config.session_ttl_days, "SESSION_TTL_DAYS", &val);
        }

        if let Some(hosts) = lookup("PROXY_ALLOWED_HOSTS") {
            config.proxy_allowed_hosts = hosts
                .split(',')
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect();
        }

        if let Some(val) = lookup("PROXY_MAX_BYTES") {
            parse_into(&mut config.proxy_max_bytes, "PROXY_MAX_BYTES", &val);
        }

        if let Some(val) = lookup("RATE_LIMIT_PER_SEC") {
            parse_into(&mut config.rate_limit_per_sec, "RATE_LIMIT_PER_SEC", &val);
        }

        if let Some(val) = lookup("RATE_LIMIT_BURST") {
            parse_into(&mut config.rate_limit_burst, "RATE_LIMIT_BURST", &val);
        }

        if let Some(val) = lookup("TRUST_PROXY_HEADERS") {
            parse_into(&mut config.trust_proxy_headers, "TRUST_PROXY_HEADERS", &val);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn admin_enabled(&self) -> bool {
        self.admin_token.is_some()
    }
}

/// Overwrite `slot` with the parsed value, keeping the default on failure.
fn parse_into<T>(slot: &mut T, key: &str, raw: &str)
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "Invalid setting, using default");
        }
    }
}
