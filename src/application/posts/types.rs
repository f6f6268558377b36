use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PaginationError;
use crate::application::render::{RenderError, TocEntry};
use crate::application::repos::RepoError;
use crate::domain::content::ContentDocument;
use crate::domain::types::PostStatus;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostCommand {
    pub title: String,
}

/// Partial update: absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostCommand {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<ContentDocument>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub tag_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PublishPostCommand {
    /// Explicit publish time; omitted means "now", rounded to the end of the
    /// current minute.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub publish_at: Option<OffsetDateTime>,
}

/// Listing entry for public pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostListItem {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    pub read_time_minutes: i32,
    pub tags: Vec<String>,
}

/// Fully rendered public detail page payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    pub read_time_minutes: i32,
    pub tags: Vec<String>,
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// Admin listing entry, including the cache-sync verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminPostItem {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub status: PostStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub read_time_minutes: i32,
    pub is_synced: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminPostPage {
    pub items: Vec<AdminPostItem>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

pub(crate) fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), PostError> {
    if value.trim().is_empty() {
        return Err(PostError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
