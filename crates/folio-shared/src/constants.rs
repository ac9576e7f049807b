/// Application name
pub const APP_NAME: &str = "Folio";

/// How long a reader must stay on a page before the view is reported (ms)
pub const DWELL_DELAY_MS: u64 = 3_000;

/// Number of changes returned by the admin history overview
pub const RECENT_CHANGES_LIMIT: usize = 20;

/// Default and maximum number of rows returned by the popular endpoint
pub const DEFAULT_POPULAR_LIMIT: u32 = 10;
pub const MAX_POPULAR_LIMIT: u32 = 100;

/// Default trailing window (days) for the popular endpoint
pub const DEFAULT_POPULAR_DAYS: i64 = 30;

/// Default window during which a viewer counts once per slug (24 hours)
pub const DEFAULT_DEDUP_WINDOW_SECS: u64 = 86_400;

/// Maximum slug length in bytes
pub const MAX_SLUG_LEN: usize = 200;

/// Maximum comment body length in characters
pub const MAX_COMMENT_LEN: usize = 2_000;

/// Maximum session username length in characters
pub const MAX_USERNAME_LEN: usize = 64;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// File names inside the data directory
pub const METADATA_FILE: &str = "metadata.json";
pub const HISTORY_DIR: &str = "history";
pub const PRODUCTS_FILE: &str = "products.json";
pub const DEALS_FILE: &str = "deals.json";
pub const DATABASE_FILE: &str = "folio.db";
