use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::application::repos::{
    CdnPurger, JobsRepo, MediaRepo, PostsRepo, PostsWriteRepo, SearchIndex, Summarizer, TagsRepo,
};
use crate::cache::CacheStore;
use crate::domain::entities::{PostRecord, TagRecord};
use crate::domain::slug::{derive_slug, numbered_successor};

use super::types::{PostError, PostListItem};

/// Orchestrates posts persistence, the versioned cache, and the external
/// collaborators. Cheap to clone: every dependency is shared.
#[derive(Clone)]
pub struct PostsService {
    pub(crate) posts: Arc<dyn PostsRepo>,
    pub(crate) writer: Arc<dyn PostsWriteRepo>,
    pub(crate) tags: Arc<dyn TagsRepo>,
    pub(crate) media: Arc<dyn MediaRepo>,
    pub(crate) jobs: Arc<dyn JobsRepo>,
    pub(crate) search: Arc<dyn SearchIndex>,
    pub(crate) cdn: Arc<dyn CdnPurger>,
    pub(crate) summarizer: Arc<dyn Summarizer>,
    pub(crate) cache: Arc<CacheStore>,
    pub(crate) public_ttl: Duration,
}

impl PostsService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        tags: Arc<dyn TagsRepo>,
        media: Arc<dyn MediaRepo>,
        jobs: Arc<dyn JobsRepo>,
        search: Arc<dyn SearchIndex>,
        cdn: Arc<dyn CdnPurger>,
        summarizer: Arc<dyn Summarizer>,
        cache: Arc<CacheStore>,
        public_ttl: Duration,
    ) -> Self {
        Self {
            posts,
            writer,
            tags,
            media,
            jobs,
            search,
            cdn,
            summarizer,
            cache,
            public_ttl,
        }
    }

    /// Produce a slug for `title` that collides with no existing post.
    ///
    /// `exclude` carries the post's own ID when regenerating during an edit,
    /// so a post never collides with itself.
    pub(crate) async fn generate_slug(
        &self,
        title: &str,
        exclude: Option<Uuid>,
    ) -> Result<String, PostError> {
        let base = derive_slug(title).map_err(|err| PostError::Validation(err.to_string()))?;

        if !self.posts.slug_exists(&base, exclude).await? {
            return Ok(base);
        }

        let existing = self
            .posts
            .similar_slugs(&format!("{base}-"), exclude)
            .await?;
        Ok(numbered_successor(&base, &existing))
    }

    /// Resolve tag names for a batch of posts in one round trip.
    pub(crate) async fn tag_names_by_post(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<String>>, PostError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let pairs = self.tags.tags_for_posts(post_ids).await?;
        let mut grouped: HashMap<Uuid, Vec<String>> = HashMap::new();
        for (post_id, tag) in pairs {
            grouped.entry(post_id).or_default().push(tag.name);
        }
        Ok(grouped)
    }

    pub(crate) fn list_item(post: PostRecord, tags: Vec<String>) -> PostListItem {
        PostListItem {
            id: post.id,
            slug: post.slug,
            title: post.title,
            summary: post.summary,
            published_at: post.published_at,
            read_time_minutes: post.read_time_minutes,
            tags,
        }
    }

    pub(crate) fn tag_ids(tags: &[TagRecord]) -> Vec<Uuid> {
        tags.iter().map(|tag| tag.id).collect()
    }
}
