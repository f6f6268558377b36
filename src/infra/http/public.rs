use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;

use crate::application::pagination::CursorPage;
use crate::application::posts::{PostDetail, PostListItem, PostsService};

use super::error::ApiError;

const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_RELATED_LIMIT: u32 = 4;

#[derive(Clone)]
pub struct PublicState {
    pub posts: Arc<PostsService>,
}

pub fn build_public_router(state: PublicState) -> Router {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/{slug}", get(post_detail))
        .route("/posts/{slug}/related", get(related_posts))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    cursor: Option<String>,
    limit: Option<u32>,
    tag: Option<String>,
}

async fn list_posts(
    State(state): State<PublicState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<CursorPage<PostListItem>>, ApiError> {
    let page = state
        .posts
        .list_public(
            query.cursor,
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            query.tag,
        )
        .await?;
    Ok(Json(page))
}

async fn post_detail(
    State(state): State<PublicState>,
    Path(slug): Path<String>,
) -> Result<Json<PostDetail>, ApiError> {
    let detail = state.posts.get_public_post(&slug).await?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
struct RelatedQuery {
    limit: Option<u32>,
}

async fn related_posts(
    State(state): State<PublicState>,
    Path(slug): Path<String>,
    Query(query): Query<RelatedQuery>,
) -> Result<Json<Vec<PostListItem>>, ApiError> {
    let related = state
        .posts
        .related_posts(&slug, query.limit.unwrap_or(DEFAULT_RELATED_LIMIT))
        .await?;
    Ok(Json(related))
}

async fn health() -> &'static str {
    "ok"
}
