use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::application::posts::{
    AdminPostPage, CreatePostCommand, PostsService, PublishPostCommand, UpdatePostCommand,
};
use crate::application::repos::{AdminPostFilter, PostSortField, SortDirection};
use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;

use super::error::ApiError;

const DEFAULT_ADMIN_PAGE_SIZE: u32 = 20;

#[derive(Clone)]
pub struct AdminState {
    pub posts: Arc<PostsService>,
    pub token: Arc<str>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/posts", get(list_posts).post(create_post))
        .route(
            "/admin/posts/{id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/admin/posts/{id}/publish", post(publish_post))
        .route("/admin/posts/{id}/unpublish", post(unpublish_post))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer_token,
        ))
        .with_state(state)
}

/// Constant-time bearer-token check for every admin route.
async fn require_bearer_token(
    State(state): State<AdminState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or_default();

    if provided.as_bytes().ct_eq(state.token.as_bytes()).unwrap_u8() == 0 {
        return Err(ApiError::unauthorized());
    }

    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
struct AdminListQuery {
    status: Option<PostStatus>,
    search: Option<String>,
    sort: Option<PostSortField>,
    direction: Option<SortDirection>,
    page: Option<u32>,
    per_page: Option<u32>,
}

async fn list_posts(
    State(state): State<AdminState>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<AdminPostPage>, ApiError> {
    let defaults = AdminPostFilter::default();
    let filter = AdminPostFilter {
        status: query.status,
        search: query.search,
        sort: query.sort.unwrap_or(defaults.sort),
        direction: query.direction.unwrap_or(defaults.direction),
    };

    let page = state
        .posts
        .list_admin(
            filter,
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(DEFAULT_ADMIN_PAGE_SIZE),
        )
        .await?;
    Ok(Json(page))
}

async fn create_post(
    State(state): State<AdminState>,
    Json(command): Json<CreatePostCommand>,
) -> Result<(StatusCode, Json<PostRecord>), ApiError> {
    let post = state.posts.create_post(command).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Debug, Serialize)]
struct AdminPostDetail {
    #[serde(flatten)]
    post: PostRecord,
    is_synced: bool,
}

async fn get_post(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminPostDetail>, ApiError> {
    let post = state.posts.find_post(id).await?;
    let is_synced = state.posts.sync_state(id).await?;
    Ok(Json(AdminPostDetail { post, is_synced }))
}

async fn update_post(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(command): Json<UpdatePostCommand>,
) -> Result<Json<PostRecord>, ApiError> {
    let post = state.posts.update_post(id, command).await?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.posts.delete_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Publish now (`{}`) or at an explicit future time
/// (`{"publish_at": "..."}`).
async fn publish_post(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(command): Json<PublishPostCommand>,
) -> Result<Json<PostRecord>, ApiError> {
    let post = state.posts.publish_post(id, command).await?;
    Ok(Json(post))
}

async fn unpublish_post(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PostRecord>, ApiError> {
    let post = state.posts.unpublish_post(id).await?;
    Ok(Json(post))
}
