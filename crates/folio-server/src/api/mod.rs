use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderMap, Method},
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use folio_store::Database;

use crate::catalog::Catalog;
use crate::config::ServerConfig;
use crate::content::ContentLibrary;
use crate::error::ServerError;
use crate::history_store::HistoryStore;
use crate::proxy::FileProxy;
use crate::rate_limit::{limit_writes, RateLimiter};
use crate::viewer_dedup::{ViewerDedup, WindowedDedup};

mod admin;
mod content;
mod reader;
mod views;


#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub history: Arc<HistoryStore>,
    pub catalog: Arc<Catalog>,
    pub dedup: Arc<dyn ViewerDedup>,
    pub content: Arc<ContentLibrary>,
    pub proxy: Arc<FileProxy>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Open every store named by `config`, creating directories as needed.
    pub async fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let db = Database::open_at(&config.database_path)?;
        let history = Arc::new(HistoryStore::new(&config.data_dir).await?);
        let catalog = Arc::new(Catalog::new(&config.data_dir, history.clone()));
        let dedup = Arc::new(WindowedDedup::new(Duration::from_secs(
            config.view_dedup_window_secs,
        )));
        let proxy = FileProxy::new(config.proxy_allowed_hosts.clone(), config.proxy_max_bytes)?;

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            history,
            catalog,
            dedup,
            content: Arc::new(ContentLibrary::new(&config.content_dir)),
            proxy: Arc::new(proxy),
            rate_limiter: RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst)
                .trusting_proxy_headers(config.trust_proxy_headers),
            config: Arc::new(config),
        })
    }

    /// Lock the database. Never hold the guard across an `.await`.
    pub(crate) fn db(&self) -> Result<MutexGuard<'_, Database>, ServerError> {
        self.db
            .lock()
            .map_err(|_| ServerError::Internal("Database lock poisoned".into()))
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Admin
        .route("/api/admin/history", get(admin::history_overview))
        .route("/api/admin/history/:date", get(admin::history_backup))
        .route("/api/admin/products", post(admin::create_product))
        .route(
            "/api/admin/products/:id",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route("/api/admin/deals", post(admin::create_deal))
        .route(
            "/api/admin/deals/:id",
            put(admin::update_deal).delete(admin::delete_deal),
        )
        .route("/api/admin/comments/:id", delete(admin::delete_comment))
        // Views
        .route("/api/views/popular", get(views::popular))
        .route("/api/views/:slug", get(views::view_stat).post(views::record_view))
        // Readers
        .route(
            "/api/auth/session",
            post(reader::create_session)
                .get(reader::current_session)
                .delete(reader::end_session),
        )
        .route("/api/favorites", get(reader::list_favorites))
        .route(
            "/api/favorites/:slug",
            post(reader::add_favorite).delete(reader::remove_favorite),
        )
        .route(
            "/api/comments/:slug",
            get(reader::list_comments).post(reader::add_comment),
        )
        // Public content
        .route("/api/products", get(content::list_products))
        .route("/api/deals", get(content::list_deals))
        .route("/api/posts", get(content::list_posts))
        .route("/api/posts/:slug", get(content::get_post))
        .route("/api/categories", get(content::list_categories))
        .route("/api/proxy", get(content::proxy_file))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            limit_writes,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
