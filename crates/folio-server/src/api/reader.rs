//! Reader accounts: sessions, favorites and comments.
//!
//! A session token is accepted from `Authorization: Bearer <token>` or the
//! `folio_session` cookie set when the session is created.

use axum::{
    extract::{Path, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::{AppendHeaders, IntoResponse},
    Json,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;

use folio_shared::constants::MAX_COMMENT_LEN;
use folio_shared::session::SessionClaims;
use folio_shared::types::Slug;
use folio_store::{Comment, Favorite, Session, StoreError};

use super::{bearer_token, AppState};
use crate::error::ServerError;

const SESSION_COOKIE: &str = "folio_session";

#[derive(Deserialize)]
pub(super) struct SessionRequest {
    username: String,
}

#[derive(Deserialize)]
pub(super) struct CommentRequest {
    body: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FavoriteResponse {
    slug: String,
    favorited: bool,
    changed: bool,
    favorite_count: i64,
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| pair.trim().strip_prefix(&format!("{SESSION_COOKIE}=")).map(str::to_string))
        .filter(|t| !t.is_empty())
}

/// Resolve the caller's live session, or fail with 401.
fn require_session(headers: &HeaderMap, state: &AppState) -> Result<Session, ServerError> {
    let token = session_token(headers)
        .ok_or_else(|| ServerError::Unauthorized("Sign in required".into()))?;

    // Reject garbage before touching the database.
    SessionClaims::decode(&token)?;

    state.db()?.get_session(&token).map_err(|e| match e {
        StoreError::NotFound => ServerError::Unauthorized("Unknown session".into()),
        other => other.into(),
    })
}

fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

// ─── Sessions ───

pub(super) async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let claims = SessionClaims::new(req.username.trim())?;
    let ttl = Duration::days(state.config.session_ttl_days.max(1));

    let session = state.db()?.create_session(&claims, ttl)?;
    info!(username = %session.username, expires_at = %session.expires_at, "Session created");

    let cookie = session_cookie(&session.token, ttl.num_seconds());
    Ok((
        StatusCode::CREATED,
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(session),
    ))
}

pub(super) async fn current_session(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Session>, ServerError> {
    Ok(Json(require_session(&headers, &state)?))
}

pub(super) async fn end_session(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
    let session = require_session(&headers, &state)?;
    let deleted = state.db()?.delete_session(&session.token)?;
    info!(username = %session.username, "Session ended");

    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie("", 0))]),
        Json(serde_json::json!({ "deleted": deleted })),
    ))
}

// ─── Favorites ───

pub(super) async fn list_favorites(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<Favorite>>, ServerError> {
    let session = require_session(&headers, &state)?;
    Ok(Json(state.db()?.list_favorites(&session.username)?))
}

pub(super) async fn add_favorite(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<FavoriteResponse>, ServerError> {
    let session = require_session(&headers, &state)?;
    let slug = Slug::parse(&slug)?;

    let db = state.db()?;
    let changed = db.add_favorite(&session.username, slug.as_str())?;
    let favorite_count = db.favorite_count(slug.as_str())?;

    Ok(Json(FavoriteResponse {
        slug: slug.to_string(),
        favorited: true,
        changed,
        favorite_count,
    }))
}

pub(super) async fn remove_favorite(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<FavoriteResponse>, ServerError> {
    let session = require_session(&headers, &state)?;
    let slug = Slug::parse(&slug)?;

    let db = state.db()?;
    let changed = db.remove_favorite(&session.username, slug.as_str())?;
    let favorite_count = db.favorite_count(slug.as_str())?;

    Ok(Json(FavoriteResponse {
        slug: slug.to_string(),
        favorited: false,
        changed,
        favorite_count,
    }))
}

// ─── Comments ───

pub(super) async fn list_comments(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<Comment>>, ServerError> {
    let slug = Slug::parse(&slug)?;
    Ok(Json(state.db()?.list_comments(slug.as_str())?))
}

pub(super) async fn add_comment(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ServerError> {
    let session = require_session(&headers, &state)?;
    let slug = Slug::parse(&slug)?;
    if state.content.has_posts().await && !state.content.post_exists(&slug).await {
        return Err(ServerError::NotFound(format!("Post {slug}")));
    }

    let body = req.body.trim();
    let len = body.chars().count();
    if len == 0 || len > MAX_COMMENT_LEN {
        return Err(ServerError::BadRequest(format!(
            "Comment must be 1 to {MAX_COMMENT_LEN} characters"
        )));
    }

    let comment = state.db()?.add_comment(slug.as_str(), &session.username, body)?;
    info!(slug = %slug, author = %comment.author, "Comment added");
    Ok((StatusCode::CREATED, Json(comment)))
}
