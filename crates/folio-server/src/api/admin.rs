//! Admin endpoints: change-history dashboard and catalog mutations.
//!
//! Every handler checks the bearer token against `ADMIN_TOKEN` first.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::info;
use uuid::Uuid;

use folio_shared::aggregate::{aggregate_by_date, recent_changes, DailyActivity};
use folio_shared::catalog::{Deal, DealInput, Product, ProductInput};
use folio_shared::constants::RECENT_CHANGES_LIMIT;
use folio_shared::types::ChangeRecord;

use super::{bearer_token, AppState};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::history_store::{BackupFile, BackupView};

const ACTOR_HEADER: &str = "x-admin-actor";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct HistoryOverview {
    history_files: Vec<BackupFile>,
    recent_changes: Vec<ChangeRecord>,
    analytics: Vec<DailyActivity>,
    total_changes: usize,
}

pub(super) fn verify_admin_token(
    headers: &HeaderMap,
    config: &ServerConfig,
) -> Result<(), ServerError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ServerError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let token = bearer_token(headers)
        .ok_or_else(|| ServerError::Unauthorized("Missing admin token".into()))?;

    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Unauthorized("Invalid admin token".into()));
    }

    Ok(())
}

fn actor(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
}

fn parse_id(raw: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(raw).map_err(|_| ServerError::BadRequest(format!("Invalid id: {raw}")))
}

// ─── History ───

pub(super) async fn history_overview(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<HistoryOverview>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let history_files = state.history.list_backup_dates().await?;
    let index = state.history.load_index().await?;

    Ok(Json(HistoryOverview {
        history_files,
        recent_changes: recent_changes(&index.changes, RECENT_CHANGES_LIMIT),
        analytics: aggregate_by_date(&index.changes),
        total_changes: index.len(),
    }))
}

pub(super) async fn history_backup(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<BackupView>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    Ok(Json(state.history.load_backup(&date).await?))
}

// ─── Products ───

pub(super) async fn create_product(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let product = state.catalog.create_product(input, actor(&headers)).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub(super) async fn update_product(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let id = parse_id(&id)?;
    Ok(Json(
        state.catalog.update_product(id, input, actor(&headers)).await?,
    ))
}

pub(super) async fn delete_product(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let id = parse_id(&id)?;
    state.catalog.delete_product(id, actor(&headers)).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ─── Deals ───

pub(super) async fn create_deal(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(input): Json<DealInput>,
) -> Result<(StatusCode, Json<Deal>), ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let deal = state.catalog.create_deal(input, actor(&headers)).await?;
    Ok((StatusCode::CREATED, Json(deal)))
}

pub(super) async fn update_deal(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<DealInput>,
) -> Result<Json<Deal>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let id = parse_id(&id)?;
    Ok(Json(state.catalog.update_deal(id, input, actor(&headers)).await?))
}

pub(super) async fn delete_deal(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let id = parse_id(&id)?;
    state.catalog.delete_deal(id, actor(&headers)).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ─── Moderation ───

pub(super) async fn delete_comment(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let id = parse_id(&id)?;

    let deleted = state.db()?.delete_comment(id)?;
    if !deleted {
        return Err(ServerError::NotFound(format!("Comment {id}")));
    }

    info!(id = %id, actor = ?actor(&headers), "Comment removed by admin");
    Ok(Json(serde_json::json!({ "deleted": true })))
}
