use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header::USER_AGENT, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use folio_shared::constants::{DEFAULT_POPULAR_DAYS, DEFAULT_POPULAR_LIMIT, MAX_POPULAR_LIMIT};
use folio_shared::types::Slug;
use folio_store::ViewStat;

use super::AppState;
use crate::error::ServerError;
use crate::rate_limit::client_ip;
use crate::viewer_dedup::viewer_key;

#[derive(Debug, Default, Deserialize)]
pub(super) struct ViewReport {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RecordedView {
    slug: String,
    view_count: i64,
    unique_views: i64,
    unique: bool,
}

#[derive(Serialize)]
pub(super) struct PopularResponse {
    popular: Vec<ViewStat>,
    count: usize,
}

/// Count one view of `slug`. Repeat views from the same viewer within the
/// dedup window still count towards `viewCount` but not `uniqueViews`.
pub(super) async fn record_view(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    report: Option<Json<ViewReport>>,
) -> Result<Json<RecordedView>, ServerError> {
    let slug = Slug::parse(&slug)?;
    if state.content.has_posts().await && !state.content.post_exists(&slug).await {
        return Err(ServerError::NotFound(format!("Post {slug}")));
    }

    let ip = client_ip(
        connect.map(|c| c.0),
        &headers,
        state.config.trust_proxy_headers,
    );
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let key = viewer_key(ip, user_agent);
    let unique = state.dedup.first_seen(slug.as_str(), &key);

    let stored = state
        .db()
        .and_then(|db| Ok(db.record_view(slug.as_str(), unique)?));
    let stat = match stored {
        Ok(stat) => stat,
        Err(e) => {
            if unique {
                state.dedup.forget(slug.as_str(), &key);
            }
            return Err(e);
        }
    };

    let path = report.and_then(|Json(r)| r.path);
    debug!(slug = %slug, path = ?path, unique, views = stat.view_count, "View recorded");

    Ok(Json(RecordedView {
        slug: stat.slug,
        view_count: stat.view_count,
        unique_views: stat.unique_views,
        unique,
    }))
}

pub(super) async fn view_stat(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ViewStat>, ServerError> {
    let slug = Slug::parse(&slug)?;
    let stat = state
        .db()?
        .get_view_stat(slug.as_str())
        .map_err(|e| match e {
            folio_store::StoreError::NotFound => {
                ServerError::NotFound(format!("No views recorded for {slug}"))
            }
            other => other.into(),
        })?;
    Ok(Json(stat))
}

/// `?limit=` (default 10, capped at 100) and `?days=` (default 30, `0` for
/// all time).
pub(super) async fn popular(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<PopularResponse>, ServerError> {
    let limit = match params.get("limit") {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| ServerError::BadRequest(format!("Invalid limit: {raw}")))?,
        None => DEFAULT_POPULAR_LIMIT,
    }
    .min(MAX_POPULAR_LIMIT);

    let days = match params.get("days") {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| ServerError::BadRequest(format!("Invalid days: {raw}")))?,
        None => DEFAULT_POPULAR_DAYS,
    };

    let popular = state.db()?.get_popular(limit, days)?;
    Ok(Json(PopularResponse {
        count: popular.len(),
        popular,
    }))
}
