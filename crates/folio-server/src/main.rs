//! # folio-server
//!
//! HTTP backend for the Folio blog.
//!
//! This binary provides:
//! - **Change history** for the affiliate catalog: an append-only change log
//!   (`metadata.json`) plus one full snapshot per day under `history/`
//! - **Admin dashboard API** that aggregates the change log by day
//! - **View tracking** with per-viewer dedup and a popularity ranking
//! - **Reader accounts**: sessions, favorites and comments (SQLite)
//! - **Content API** for markdown posts, categories and an allow-listed
//!   file proxy
//! - **Per-IP rate limiting** on write requests

mod api;
mod catalog;
mod config;
mod content;
mod error;
mod history_store;
mod proxy;
mod rate_limit;
mod viewer_dedup;

use std::time::Duration;

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,folio_server=debug")),
        )
        .init();

    info!("Starting Folio server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        data_dir = %config.data_dir.display(),
        content_dir = %config.content_dir.display(),
        database = %config.database_path.display(),
        admin_enabled = config.admin_enabled(),
        proxy_hosts = config.proxy_allowed_hosts.len(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    let app_state = AppState::from_config(config).await?;

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = app_state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let removed = rl.purge_stale(600.0).await;
            debug!(removed, "Purged idle rate-limit buckets");
        }
    });

    // Viewer dedup cleanup (every 10 minutes)
    let dedup = app_state.dedup.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            dedup.purge_expired();
        }
    });

    // Expired session cleanup (hourly)
    let db = app_state.db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            let result = match db.lock() {
                Ok(db) => db.purge_expired_sessions(),
                Err(_) => {
                    warn!("Database lock poisoned, skipping session purge");
                    continue;
                }
            };
            match result {
                Ok(removed) => debug!(removed, "Purged expired sessions"),
                Err(e) => warn!(error = %e, "Session purge failed"),
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
