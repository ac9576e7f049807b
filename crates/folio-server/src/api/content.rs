use axum::{
    extract::{Path, Query, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use folio_shared::catalog::{Deal, Product};
use folio_shared::types::Slug;

use super::AppState;
use crate::content::{Category, Post, PostMeta};
use crate::error::ServerError;

#[derive(Deserialize)]
pub(super) struct PostsQuery {
    category: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct ProxyQuery {
    url: Option<String>,
}

pub(super) async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, ServerError> {
    Ok(Json(state.catalog.list_products().await?))
}

pub(super) async fn list_deals(State(state): State<AppState>) -> Result<Json<Vec<Deal>>, ServerError> {
    Ok(Json(state.catalog.list_deals().await?))
}

pub(super) async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostsQuery>,
) -> Result<Json<Vec<PostMeta>>, ServerError> {
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    Ok(Json(state.content.list_posts(category).await?))
}

pub(super) async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Post>, ServerError> {
    let slug = Slug::parse(&slug)?;
    Ok(Json(state.content.get_post(&slug).await?))
}

pub(super) async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, ServerError> {
    Ok(Json(state.content.list_categories().await?))
}

pub(super) async fn proxy_file(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ServerError> {
    let url = query
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ServerError::BadRequest("Missing 'url' query parameter".into()))?;

    let file = state.proxy.fetch(&url).await?;
    let content_type = file
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(([(CONTENT_TYPE, content_type)], file.body).into_response())
}
