//! In-memory fakes for the repository, job, and collaborator traits, plus a
//! harness that wires them into a `PostsService`.

// Each integration test binary compiles this module and uses a different
// subset of it.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use folio::application::pagination::{CursorPage, PostCursor};
use folio::application::posts::PostsService;
use folio::application::repos::{
    AdminPostFilter, CdnPurger, CollaboratorError, CreatePostParams, JobsRepo, MediaRepo,
    PostSortField, PostsRepo, PostsWriteRepo, RepoError, ScheduleJobParams, SearchDocument,
    SearchIndex, SortDirection, Summarizer, TagsRepo, TerminateOutcome, UpdatePostParams,
};
use folio::cache::CacheStore;
use folio::domain::content::ContentDocument;
use folio::domain::entities::{JobRecord, PostRecord, TagRecord};
use folio::domain::types::{JobState, PostStatus};

pub const TEST_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().expect("test mutex poisoned")
}

// ============================================================================
// Posts / tags / media
// ============================================================================

#[derive(Default)]
pub struct MemoryRepo {
    posts: Mutex<HashMap<Uuid, PostRecord>>,
    tag_catalog: Mutex<HashMap<Uuid, TagRecord>>,
    post_tags: Mutex<HashMap<Uuid, Vec<Uuid>>>,
    related: Mutex<HashMap<Uuid, Vec<Uuid>>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_post(&self, post: PostRecord) {
        lock(&self.posts).insert(post.id, post);
    }

    pub fn remove_post(&self, id: Uuid) {
        lock(&self.posts).remove(&id);
    }

    pub fn post(&self, id: Uuid) -> Option<PostRecord> {
        lock(&self.posts).get(&id).cloned()
    }

    pub fn define_tag(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        lock(&self.tag_catalog).insert(
            id,
            TagRecord {
                id,
                slug: name.to_lowercase().replace(' ', "-"),
                name: name.to_string(),
                created_at: OffsetDateTime::now_utc(),
            },
        );
        id
    }

    pub fn set_related(&self, post_id: Uuid, related: Vec<Uuid>) {
        lock(&self.related).insert(post_id, related);
    }

    fn is_public(post: &PostRecord, visible_until: OffsetDateTime) -> bool {
        post.status == PostStatus::Published
            && post
                .published_at
                .is_some_and(|published| published <= visible_until)
    }

    fn tags_of(&self, post_id: Uuid) -> Vec<TagRecord> {
        let catalog = lock(&self.tag_catalog);
        lock(&self.post_tags)
            .get(&post_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| catalog.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl PostsRepo for MemoryRepo {
    async fn list_public_posts(
        &self,
        cursor: Option<PostCursor>,
        limit: u32,
        tag: Option<&str>,
        visible_until: OffsetDateTime,
    ) -> Result<CursorPage<PostRecord>, RepoError> {
        let mut posts: Vec<PostRecord> = lock(&self.posts)
            .values()
            .filter(|post| Self::is_public(post, visible_until))
            .cloned()
            .collect();

        if let Some(tag) = tag {
            posts.retain(|post| self.tags_of(post.id).iter().any(|t| t.slug == tag));
        }

        posts.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then(b.id.cmp(&a.id))
        });

        if let Some(cursor) = cursor {
            posts.retain(|post| {
                let key = (post.published_at, post.id);
                key < (Some(cursor.published_at()), cursor.id())
            });
        }

        let limit = limit as usize;
        let has_more = posts.len() > limit;
        posts.truncate(limit);

        let next_cursor = if has_more {
            posts.last().map(|post| {
                PostCursor::new(
                    post.published_at.unwrap_or(post.created_at),
                    post.id,
                )
                .encode()
            })
        } else {
            None
        };

        Ok(CursorPage::new(posts, next_cursor))
    }

    async fn find_by_slug(
        &self,
        slug: &str,
        public_only: bool,
        visible_until: OffsetDateTime,
    ) -> Result<Option<PostRecord>, RepoError> {
        Ok(lock(&self.posts)
            .values()
            .find(|post| post.slug == slug)
            .filter(|post| !public_only || Self::is_public(post, visible_until))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(lock(&self.posts).get(&id).cloned())
    }

    async fn related_post_ids(
        &self,
        post_id: Uuid,
        limit: u32,
        _visible_until: OffsetDateTime,
    ) -> Result<Vec<Uuid>, RepoError> {
        let mut ids = lock(&self.related).get(&post_id).cloned().unwrap_or_default();
        ids.truncate(limit as usize);
        Ok(ids)
    }

    async fn public_posts_by_ids(
        &self,
        ids: &[Uuid],
        visible_until: OffsetDateTime,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let posts = lock(&self.posts);
        let mut found: Vec<PostRecord> = ids
            .iter()
            .filter_map(|id| posts.get(id))
            .filter(|post| Self::is_public(post, visible_until))
            .cloned()
            .collect();
        // Deliberately not the caller's order: bulk lookups are unordered.
        found.sort_by_key(|post| post.id);
        Ok(found)
    }

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, RepoError> {
        Ok(lock(&self.posts)
            .values()
            .any(|post| post.slug == slug && Some(post.id) != exclude))
    }

    async fn similar_slugs(
        &self,
        prefix: &str,
        exclude: Option<Uuid>,
    ) -> Result<Vec<String>, RepoError> {
        Ok(lock(&self.posts)
            .values()
            .filter(|post| post.slug.starts_with(prefix) && Some(post.id) != exclude)
            .map(|post| post.slug.clone())
            .collect())
    }

    async fn list_admin_posts(
        &self,
        filter: &AdminPostFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut posts: Vec<PostRecord> = lock(&self.posts)
            .values()
            .filter(|post| filter.status.is_none_or(|status| post.status == status))
            .filter(|post| {
                filter
                    .search
                    .as_ref()
                    .is_none_or(|needle| post.title.contains(needle.as_str()))
            })
            .cloned()
            .collect();

        posts.sort_by(|a, b| {
            let ordering = match filter.sort {
                PostSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                PostSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                PostSortField::PublishedAt => a.published_at.cmp(&b.published_at),
                PostSortField::Title => a.title.cmp(&b.title),
            };
            match filter.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        Ok(posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_admin_posts(&self, filter: &AdminPostFilter) -> Result<u64, RepoError> {
        Ok(lock(&self.posts)
            .values()
            .filter(|post| filter.status.is_none_or(|status| post.status == status))
            .filter(|post| {
                filter
                    .search
                    .as_ref()
                    .is_none_or(|needle| post.title.contains(needle.as_str()))
            })
            .count() as u64)
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepo {
    async fn insert_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let post = PostRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            title: params.title,
            content: params.content,
            summary: params.summary,
            status: params.status,
            published_at: params.published_at,
            read_time_minutes: params.read_time_minutes,
            created_at: now,
            updated_at: now,
        };
        lock(&self.posts).insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut posts = lock(&self.posts);
        let post = posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        post.slug = params.slug;
        post.title = params.title;
        post.content = params.content;
        post.summary = params.summary;
        post.read_time_minutes = params.read_time_minutes;
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }

    async fn update_summary(&self, id: Uuid, summary: &str) -> Result<(), RepoError> {
        let mut posts = lock(&self.posts);
        let post = posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.summary = Some(summary.to_string());
        post.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn mark_published(
        &self,
        id: Uuid,
        published_at: OffsetDateTime,
    ) -> Result<PostRecord, RepoError> {
        let mut posts = lock(&self.posts);
        let post = posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.status = PostStatus::Published;
        post.published_at = Some(published_at);
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }

    async fn mark_unpublished(&self, id: Uuid) -> Result<PostRecord, RepoError> {
        let mut posts = lock(&self.posts);
        let post = posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.status = PostStatus::Draft;
        post.published_at = None;
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        lock(&self.posts)
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn replace_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError> {
        lock(&self.post_tags).insert(post_id, tag_ids.to_vec());
        Ok(())
    }
}

#[async_trait]
impl TagsRepo for MemoryRepo {
    async fn tags_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError> {
        Ok(self.tags_of(post_id))
    }

    async fn tags_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, TagRecord)>, RepoError> {
        let mut pairs = Vec::new();
        for &post_id in post_ids {
            for tag in self.tags_of(post_id) {
                pairs.push((post_id, tag));
            }
        }
        Ok(pairs)
    }
}

#[derive(Default)]
pub struct RecordingMedia {
    pub calls: Mutex<Vec<(Uuid, Vec<String>)>>,
}

impl RecordingMedia {
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl MediaRepo for RecordingMedia {
    async fn replace_post_media(&self, post_id: Uuid, urls: &[String]) -> Result<(), RepoError> {
        lock(&self.calls).push((post_id, urls.to_vec()));
        Ok(())
    }

    async fn delete_post_media(&self, _post_id: Uuid) -> Result<(), RepoError> {
        Ok(())
    }
}

// ============================================================================
// Jobs
// ============================================================================

#[derive(Default)]
pub struct MemoryJobs {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl MemoryJobs {
    pub fn job(&self, id: &str) -> Option<JobRecord> {
        lock(&self.jobs).get(id).cloned()
    }

    pub fn count(&self) -> usize {
        lock(&self.jobs).len()
    }
}

#[async_trait]
impl JobsRepo for MemoryJobs {
    async fn schedule_job(&self, params: ScheduleJobParams) -> Result<JobRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = JobRecord {
            id: params.id.clone(),
            kind: params.kind,
            payload: params.payload,
            state: JobState::Scheduled,
            run_at: params.run_at,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        lock(&self.jobs).insert(params.id, record.clone());
        Ok(record)
    }

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError> {
        Ok(lock(&self.jobs).get(id).cloned())
    }

    async fn terminate_job(&self, id: &str) -> Result<TerminateOutcome, RepoError> {
        let mut jobs = lock(&self.jobs);
        match jobs.get_mut(id) {
            None => Ok(TerminateOutcome::NotFound),
            Some(job) if job.state.is_terminal() => Ok(TerminateOutcome::AlreadyFinished),
            Some(job) => {
                job.state = JobState::Killed;
                Ok(TerminateOutcome::Terminated)
            }
        }
    }

    async fn claim_due_jobs(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<JobRecord>, RepoError> {
        let mut jobs = lock(&self.jobs);
        let mut claimed = Vec::new();
        for job in jobs.values_mut() {
            if claimed.len() >= limit as usize {
                break;
            }
            if job.state == JobState::Scheduled && job.run_at <= now {
                job.state = JobState::Running;
                job.attempts += 1;
                claimed.push(job.clone());
            }
        }
        Ok(claimed)
    }

    async fn complete_job(&self, id: &str) -> Result<(), RepoError> {
        if let Some(job) = lock(&self.jobs).get_mut(id) {
            job.state = JobState::Done;
        }
        Ok(())
    }

    async fn fail_job(&self, id: &str, error: &str) -> Result<(), RepoError> {
        if let Some(job) = lock(&self.jobs).get_mut(id) {
            job.state = JobState::Failed;
            job.last_error = Some(error.to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Collaborators
// ============================================================================

#[derive(Default)]
pub struct RecordingSearch {
    pub upserts: Mutex<Vec<SearchDocument>>,
    pub deletes: Mutex<Vec<Uuid>>,
}

impl RecordingSearch {
    pub fn upsert_count(&self) -> usize {
        lock(&self.upserts).len()
    }

    pub fn deleted(&self, id: Uuid) -> bool {
        lock(&self.deletes).contains(&id)
    }
}

#[async_trait]
impl SearchIndex for RecordingSearch {
    async fn upsert(&self, document: &SearchDocument) -> Result<(), CollaboratorError> {
        lock(&self.upserts).push(document.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), CollaboratorError> {
        lock(&self.deletes).push(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingCdn {
    pub purges: Mutex<Vec<String>>,
}

impl RecordingCdn {
    pub fn purged(&self, slug: &str) -> bool {
        lock(&self.purges).iter().any(|purged| purged == slug)
    }

    pub fn purge_count(&self) -> usize {
        lock(&self.purges).len()
    }
}

#[async_trait]
impl CdnPurger for RecordingCdn {
    async fn purge_post(&self, slug: &str) -> Result<(), CollaboratorError> {
        lock(&self.purges).push(slug.to_string());
        Ok(())
    }
}

pub struct StaticSummarizer {
    pub reply: String,
    pub calls: AtomicUsize,
}

impl StaticSummarizer {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for StaticSummarizer {
    async fn summarize(&self, _text: &str) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub repo: Arc<MemoryRepo>,
    pub media: Arc<RecordingMedia>,
    pub jobs: Arc<MemoryJobs>,
    pub search: Arc<RecordingSearch>,
    pub cdn: Arc<RecordingCdn>,
    pub summarizer: Arc<StaticSummarizer>,
    pub cache: Arc<CacheStore>,
    pub service: Arc<PostsService>,
}

impl Harness {
    pub fn new() -> Self {
        let repo = Arc::new(MemoryRepo::new());
        let media = Arc::new(RecordingMedia::default());
        let jobs = Arc::new(MemoryJobs::default());
        let search = Arc::new(RecordingSearch::default());
        let cdn = Arc::new(RecordingCdn::default());
        let summarizer = Arc::new(StaticSummarizer::new("an automatic summary"));
        let cache = Arc::new(CacheStore::new());

        let service = Arc::new(PostsService::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            media.clone(),
            jobs.clone(),
            search.clone(),
            cdn.clone(),
            summarizer.clone(),
            cache.clone(),
            TEST_TTL,
        ));

        Self {
            repo,
            media,
            jobs,
            search,
            cdn,
            summarizer,
            cache,
            service,
        }
    }

    /// Seed a published post directly into the fake repository.
    pub fn seed_published(&self, slug: &str, title: &str, published_at: OffsetDateTime) -> Uuid {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        self.repo.seed_post(PostRecord {
            id,
            slug: slug.to_string(),
            title: title.to_string(),
            content: ContentDocument::empty(),
            summary: Some(format!("{title} summary")),
            status: PostStatus::Published,
            published_at: Some(published_at),
            read_time_minutes: 1,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn seed_draft(&self, slug: &str, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        self.repo.seed_post(PostRecord {
            id,
            slug: slug.to_string(),
            title: title.to_string(),
            content: ContentDocument::empty(),
            summary: None,
            status: PostStatus::Draft,
            published_at: None,
            read_time_minutes: 0,
            created_at: now,
            updated_at: now,
        });
        id
    }
}

/// Poll until `condition` holds, failing the test after a short timeout.
/// Used to observe work running on detached tasks.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within timeout");
}
