//! Repository and collaborator traits describing persistence and external
//! service adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PaginationError, PostCursor};
use crate::domain::content::ContentDocument;
use crate::domain::entities::{JobRecord, PostRecord, TagRecord};
use crate::domain::types::{JobKind, PostStatus};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSortField {
    CreatedAt,
    UpdatedAt,
    PublishedAt,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Filters for the administrative listing; the public listing has its own
/// narrower parameter set (cursor, limit, tag).
#[derive(Debug, Clone)]
pub struct AdminPostFilter {
    pub status: Option<PostStatus>,
    pub search: Option<String>,
    pub sort: PostSortField,
    pub direction: SortDirection,
}

impl Default for AdminPostFilter {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            sort: PostSortField::UpdatedAt,
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub slug: String,
    pub title: String,
    pub content: ContentDocument,
    pub summary: Option<String>,
    pub status: PostStatus,
    pub published_at: Option<OffsetDateTime>,
    pub read_time_minutes: i32,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub content: ContentDocument,
    pub summary: Option<String>,
    pub read_time_minutes: i32,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Public keyset-paginated listing: published posts whose publish time is
    /// at or before `visible_until`, newest first, optionally filtered by tag
    /// slug.
    async fn list_public_posts(
        &self,
        cursor: Option<PostCursor>,
        limit: u32,
        tag: Option<&str>,
        visible_until: OffsetDateTime,
    ) -> Result<CursorPage<PostRecord>, RepoError>;

    async fn find_by_slug(
        &self,
        slug: &str,
        public_only: bool,
        visible_until: OffsetDateTime,
    ) -> Result<Option<PostRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    /// IDs of publicly visible posts related to `post_id`, strongest first.
    async fn related_post_ids(
        &self,
        post_id: Uuid,
        limit: u32,
        visible_until: OffsetDateTime,
    ) -> Result<Vec<Uuid>, RepoError>;

    /// Bulk lookup restricted to publicly visible posts. Order of the result
    /// is unspecified; callers reconstruct their own ordering.
    async fn public_posts_by_ids(
        &self,
        ids: &[Uuid],
        visible_until: OffsetDateTime,
    ) -> Result<Vec<PostRecord>, RepoError>;

    /// Whether `slug` is taken, optionally ignoring one post (the edit case).
    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, RepoError>;

    /// Every existing slug starting with `prefix`, optionally ignoring one
    /// post. Used to scan numbered slug variants.
    async fn similar_slugs(
        &self,
        prefix: &str,
        exclude: Option<Uuid>,
    ) -> Result<Vec<String>, RepoError>;

    async fn list_admin_posts(
        &self,
        filter: &AdminPostFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn count_admin_posts(&self, filter: &AdminPostFilter) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn insert_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    /// Full-row content update; fails with [`RepoError::NotFound`] when the
    /// post does not exist.
    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_summary(&self, id: Uuid, summary: &str) -> Result<(), RepoError>;

    async fn mark_published(
        &self,
        id: Uuid,
        published_at: OffsetDateTime,
    ) -> Result<PostRecord, RepoError>;

    async fn mark_unpublished(&self, id: Uuid) -> Result<PostRecord, RepoError>;

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;

    async fn replace_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    async fn tags_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError>;

    async fn tags_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, TagRecord)>, RepoError>;
}

/// Media-reference index derived from post content.
#[async_trait]
pub trait MediaRepo: Send + Sync {
    async fn replace_post_media(&self, post_id: Uuid, urls: &[String]) -> Result<(), RepoError>;

    async fn delete_post_media(&self, post_id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct ScheduleJobParams {
    pub id: String,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub run_at: OffsetDateTime,
}

/// Result of a termination attempt. Missing and already-finished instances
/// are expected outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    Terminated,
    NotFound,
    AlreadyFinished,
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    /// Insert or replace the job with this ID. Scheduling onto an existing ID
    /// supersedes the previous instance regardless of its state.
    async fn schedule_job(&self, params: ScheduleJobParams) -> Result<JobRecord, RepoError>;

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError>;

    async fn terminate_job(&self, id: &str) -> Result<TerminateOutcome, RepoError>;

    /// Claim up to `limit` due jobs, transitioning them to running.
    async fn claim_due_jobs(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<JobRecord>, RepoError>;

    async fn complete_job(&self, id: &str) -> Result<(), RepoError>;

    async fn fail_job(&self, id: &str, error: &str) -> Result<(), RepoError>;
}

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator request failed: {0}")]
    Transport(String),
    #[error("collaborator returned status {status}")]
    Status { status: u16 },
    #[error("collaborator response malformed: {0}")]
    Malformed(String),
}

/// Document shape pushed to the search backend.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchDocument {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, document: &SearchDocument) -> Result<(), CollaboratorError>;

    async fn delete(&self, id: Uuid) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait CdnPurger: Send + Sync {
    async fn purge_post(&self, slug: &str) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, CollaboratorError>;
}
