use std::collections::HashMap;

use uuid::Uuid;

use crate::application::pagination::{CursorPage, PostCursor};
use crate::application::render::render_document;
use crate::application::repos::AdminPostFilter;
use crate::cache::{POSTS_DETAIL_NS, POSTS_LIST_NS, detail_key, list_key, related_key,
    sync_hash_key};
use crate::domain::entities::PostRecord;
use crate::domain::sync;
use crate::util::clock::end_of_current_minute;

use super::service::PostsService;
use super::types::{AdminPostItem, AdminPostPage, PostDetail, PostError, PostListItem};

const MAX_PAGE_SIZE: u32 = 50;
const MAX_RELATED: u32 = 10;
const MAX_ADMIN_PAGE_SIZE: u32 = 100;

impl PostsService {
    /// Public listing: published posts visible as of the current minute,
    /// newest first, served through the versioned list cache.
    pub async fn list_public(
        &self,
        cursor: Option<String>,
        limit: u32,
        tag: Option<String>,
    ) -> Result<CursorPage<PostListItem>, PostError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        // Decode up front so a malformed cursor is rejected instead of cached.
        let decoded = cursor.as_deref().map(PostCursor::decode).transpose()?;

        let version = self.cache.version(POSTS_LIST_NS);
        let key = list_key(version, limit, cursor.as_deref(), tag.as_deref());
        let visible_until = end_of_current_minute();

        self.cache
            .get_with(&key, self.public_ttl, || async move {
                let page = self
                    .posts
                    .list_public_posts(decoded, limit, tag.as_deref(), visible_until)
                    .await?;

                let ids: Vec<Uuid> = page.items.iter().map(|post| post.id).collect();
                let mut tag_names = self.tag_names_by_post(&ids).await?;

                let items = page
                    .items
                    .into_iter()
                    .map(|post| {
                        let tags = tag_names.remove(&post.id).unwrap_or_default();
                        Self::list_item(post, tags)
                    })
                    .collect();

                Ok(CursorPage::new(items, page.next_cursor))
            })
            .await
    }

    /// Public detail page: rendered content plus table of contents, served
    /// through the versioned detail cache.
    ///
    /// Misses are cached too (as `null`); publishing or editing bumps the
    /// detail version, so a cached miss never outlives the state it observed.
    pub async fn get_public_post(&self, slug: &str) -> Result<PostDetail, PostError> {
        let version = self.cache.version(POSTS_DETAIL_NS);
        let key = detail_key(version, slug);
        let visible_until = end_of_current_minute();

        let detail: Option<PostDetail> = self
            .cache
            .get_with(&key, self.public_ttl, || async move {
                let Some(post) = self.posts.find_by_slug(slug, true, visible_until).await? else {
                    return Ok::<_, PostError>(None);
                };

                let tags = self.tags.tags_for_post(post.id).await?;
                let rendered = render_document(&post.content)?;

                Ok(Some(PostDetail {
                    id: post.id,
                    slug: post.slug,
                    title: post.title,
                    summary: post.summary,
                    published_at: post.published_at,
                    read_time_minutes: post.read_time_minutes,
                    tags: tags.into_iter().map(|tag| tag.name).collect(),
                    html: rendered.html,
                    toc: rendered.toc,
                }))
            })
            .await?;

        detail.ok_or(PostError::NotFound)
    }

    /// Related posts, resolved in two stages: a long-lived cached ID list,
    /// then a live lookup that drops IDs no longer publicly visible while
    /// preserving the cached order.
    pub async fn related_posts(
        &self,
        slug: &str,
        limit: u32,
    ) -> Result<Vec<PostListItem>, PostError> {
        let limit = limit.clamp(1, MAX_RELATED);
        let key = related_key(slug, limit);
        let visible_until = end_of_current_minute();

        let ids: Vec<Uuid> = self
            .cache
            .get_with(&key, self.public_ttl, || async move {
                let Some(post) = self.posts.find_by_slug(slug, true, visible_until).await? else {
                    return Ok(Vec::new());
                };
                self.posts
                    .related_post_ids(post.id, limit, visible_until)
                    .await
                    .map_err(PostError::from)
            })
            .await?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.posts.public_posts_by_ids(&ids, visible_until).await?;
        let mut by_id: HashMap<Uuid, _> = records.into_iter().map(|post| (post.id, post)).collect();

        // Bulk lookups come back unordered; the cached sequence is the order
        // of record. Vanished IDs shorten the list.
        let ordered: Vec<_> = ids.iter().filter_map(|id| by_id.remove(id)).collect();

        let ordered_ids: Vec<Uuid> = ordered.iter().map(|post| post.id).collect();
        let mut tag_names = self.tag_names_by_post(&ordered_ids).await?;

        Ok(ordered
            .into_iter()
            .map(|post| {
                let tags = tag_names.remove(&post.id).unwrap_or_default();
                Self::list_item(post, tags)
            })
            .collect())
    }

    /// Admin listing with per-post cache-sync verdicts. Uncached: admins
    /// need to see the database row, not a snapshot of it.
    pub async fn list_admin(
        &self,
        filter: AdminPostFilter,
        page: u32,
        per_page: u32,
    ) -> Result<AdminPostPage, PostError> {
        let per_page = per_page.clamp(1, MAX_ADMIN_PAGE_SIZE);
        let page = page.max(1);
        let offset = u64::from(page - 1) * u64::from(per_page);

        let records = self.posts.list_admin_posts(&filter, offset, per_page).await?;
        let total = self.posts.count_admin_posts(&filter).await?;

        let mut items = Vec::with_capacity(records.len());
        for post in records {
            let tags = self.tags.tags_for_post(post.id).await?;
            let tag_ids = Self::tag_ids(&tags);
            let stored_hash = self.cache.get_raw(&sync_hash_key(post.id));
            let is_synced = sync::is_synced(&post, &tag_ids, stored_hash.as_deref());

            items.push(AdminPostItem {
                id: post.id,
                slug: post.slug,
                title: post.title,
                status: post.status,
                published_at: post.published_at,
                updated_at: post.updated_at,
                read_time_minutes: post.read_time_minutes,
                is_synced,
                tags: tags.into_iter().map(|tag| tag.name).collect(),
            });
        }

        Ok(AdminPostPage {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Admin fetch by ID, bypassing every cache.
    pub async fn find_post(&self, id: Uuid) -> Result<PostRecord, PostError> {
        self.posts.find_by_id(id).await?.ok_or(PostError::NotFound)
    }

    /// Sync verdict for a single post, as shown in the admin listing.
    pub async fn sync_state(&self, id: Uuid) -> Result<bool, PostError> {
        let post = self.posts.find_by_id(id).await?.ok_or(PostError::NotFound)?;
        let tags = self.tags.tags_for_post(id).await?;
        let stored_hash = self.cache.get_raw(&sync_hash_key(id));
        Ok(sync::is_synced(
            &post,
            &Self::tag_ids(&tags),
            stored_hash.as_deref(),
        ))
    }
}
