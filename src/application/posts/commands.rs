use std::sync::Arc;

use futures::join;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::jobs::{ScheduledPublishPayload, scheduled_publish_job_id};
use crate::application::repos::{
    CreatePostParams, ScheduleJobParams, SearchDocument, UpdatePostParams,
};
use crate::cache::{POSTS_DETAIL_NS, POSTS_LIST_NS, detail_key, sync_hash_key};
use crate::domain::content::ContentDocument;
use crate::domain::entities::PostRecord;
use crate::domain::sync::public_content_hash;
use crate::domain::types::{JobKind, PostStatus};
use crate::util::clock::end_of_minute;

use super::service::PostsService;
use super::types::{
    CreatePostCommand, PostError, PublishPostCommand, UpdatePostCommand, ensure_non_empty,
};

impl PostsService {
    /// Create a new post as an empty draft.
    pub async fn create_post(&self, command: CreatePostCommand) -> Result<PostRecord, PostError> {
        ensure_non_empty(&command.title, "title")?;

        let slug = self.generate_slug(&command.title, None).await?;

        let post = self
            .writer
            .insert_post(CreatePostParams {
                slug,
                title: command.title,
                content: ContentDocument::empty(),
                summary: None,
                status: PostStatus::Draft,
                published_at: None,
                read_time_minutes: 0,
            })
            .await?;

        info!(post_id = %post.id, slug = post.slug, "post created");
        Ok(post)
    }

    /// Apply a partial update to a post.
    ///
    /// A title change regenerates the slug (excluding the post's own ID from
    /// the collision scan). A content change resynchronizes the
    /// media-reference index off the request path. Edits to a published post
    /// bump the list and detail cache versions so public readers never see a
    /// stale snapshot for a full TTL.
    pub async fn update_post(
        &self,
        id: Uuid,
        command: UpdatePostCommand,
    ) -> Result<PostRecord, PostError> {
        let post = self.posts.find_by_id(id).await?.ok_or(PostError::NotFound)?;

        let title = match command.title {
            Some(title) => {
                ensure_non_empty(&title, "title")?;
                title
            }
            None => post.title.clone(),
        };

        let slug = if title != post.title {
            self.generate_slug(&title, Some(id)).await?
        } else {
            post.slug.clone()
        };

        let content_changed = command
            .content
            .as_ref()
            .is_some_and(|content| *content != post.content);
        let content = command.content.unwrap_or_else(|| post.content.clone());
        let summary = command.summary.or_else(|| post.summary.clone());
        let read_time_minutes = if content_changed {
            content.read_time_minutes()
        } else {
            post.read_time_minutes
        };

        let updated = self
            .writer
            .update_post(UpdatePostParams {
                id,
                slug,
                title,
                content,
                summary,
                read_time_minutes,
            })
            .await?;

        if let Some(tag_ids) = command.tag_ids {
            let mut deduped = tag_ids;
            deduped.sort();
            deduped.dedup();
            self.writer.replace_post_tags(id, &deduped).await?;
        }

        if content_changed {
            self.spawn_media_resync(id, updated.content.media_urls());
        }

        if updated.is_published() {
            self.cache.bump_version(POSTS_LIST_NS);
            self.cache.bump_version(POSTS_DETAIL_NS);
        }

        Ok(updated)
    }

    /// Delete a post and clean up its public footprint.
    ///
    /// The cleanup batch runs detached from the request: the row is already
    /// gone, so a failing purge is logged rather than surfaced.
    pub async fn delete_post(&self, id: Uuid) -> Result<(), PostError> {
        let post = self.posts.find_by_id(id).await?.ok_or(PostError::NotFound)?;

        self.writer.delete_post(id).await?;
        info!(post_id = %id, slug = post.slug, "post deleted");

        let cache = Arc::clone(&self.cache);
        let search = Arc::clone(&self.search);
        let cdn = Arc::clone(&self.cdn);
        let jobs = Arc::clone(&self.jobs);
        let was_published = post.is_published();
        let slug = post.slug;

        tokio::spawn(async move {
            if was_published {
                let detail_version = cache.version(POSTS_DETAIL_NS);
                cache.delete(&detail_key(detail_version, &slug));
                cache.bump_version(POSTS_LIST_NS);

                let job_id = scheduled_publish_job_id(id);
                let (terminated, search_result, cdn_result) = join!(
                    jobs.terminate_job(&job_id),
                    search.delete(id),
                    cdn.purge_post(&slug),
                );
                if let Err(error) = terminated {
                    warn!(post_id = %id, %error, "failed to terminate scheduled publish");
                }
                if let Err(error) = search_result {
                    warn!(post_id = %id, %error, "failed to remove post from search index");
                }
                if let Err(error) = cdn_result {
                    warn!(post_id = %id, %error, "failed to purge CDN cache");
                }
            }

            cache.delete(&sync_hash_key(id));
        });

        Ok(())
    }

    /// Transition a post to published.
    ///
    /// The effective publish time defaults to the end of the current minute
    /// when neither the command nor the row carries one. Any pre-existing
    /// scheduled-publish instance is terminated first; scheduling reuses the
    /// deterministic instance ID, so re-invocation supersedes prior
    /// schedules. A publish time still in the future defers the post-process
    /// pipeline to the job worker; otherwise it runs off the request path
    /// immediately.
    pub async fn publish_post(
        &self,
        id: Uuid,
        command: PublishPostCommand,
    ) -> Result<PostRecord, PostError> {
        let post = self.posts.find_by_id(id).await?.ok_or(PostError::NotFound)?;

        // Publication is minute-granular: anything inside the current minute
        // counts as "now", so a fresh minute-end stamp publishes immediately.
        let visibility_horizon = end_of_minute(OffsetDateTime::now_utc());
        let effective = command
            .publish_at
            .or(post.published_at)
            .unwrap_or(visibility_horizon);

        let updated = self.writer.mark_published(id, effective).await?;

        let job_id = scheduled_publish_job_id(id);
        let outcome = self.jobs.terminate_job(&job_id).await?;
        debug!(post_id = %id, ?outcome, "previous scheduled publish resolved");

        if effective > visibility_horizon {
            self.jobs
                .schedule_job(ScheduleJobParams {
                    id: job_id,
                    kind: JobKind::ScheduledPublish,
                    payload: serde_json::to_value(ScheduledPublishPayload { post_id: id })
                        .map_err(|err| PostError::Validation(err.to_string()))?,
                    run_at: effective,
                })
                .await?;
            info!(post_id = %id, publish_at = %effective, "publish scheduled");
        } else {
            let service = self.clone();
            tokio::spawn(async move {
                if let Err(error) = service.run_post_process(id).await {
                    warn!(post_id = %id, %error, "post-process pipeline failed");
                }
            });
            info!(post_id = %id, "post published");
        }

        Ok(updated)
    }

    /// Return a post to draft and retract its public footprint.
    ///
    /// The sync hash stays behind: a lingering hash is what
    /// marks the draft as desynced in the admin listing until the next
    /// publish or delete.
    pub async fn unpublish_post(&self, id: Uuid) -> Result<PostRecord, PostError> {
        self.posts.find_by_id(id).await?.ok_or(PostError::NotFound)?;

        let updated = self.writer.mark_unpublished(id).await?;

        let outcome = self.jobs.terminate_job(&scheduled_publish_job_id(id)).await?;
        debug!(post_id = %id, ?outcome, "scheduled publish resolved on unpublish");

        self.cache.bump_version(POSTS_LIST_NS);
        self.cache.bump_version(POSTS_DETAIL_NS);

        let search = Arc::clone(&self.search);
        let cdn = Arc::clone(&self.cdn);
        let slug = updated.slug.clone();
        tokio::spawn(async move {
            let (search_result, cdn_result) = join!(search.delete(id), cdn.purge_post(&slug));
            if let Err(error) = search_result {
                warn!(post_id = %id, %error, "failed to remove post from search index");
            }
            if let Err(error) = cdn_result {
                warn!(post_id = %id, %error, "failed to purge CDN cache");
            }
        });

        info!(post_id = %id, "post unpublished");
        Ok(updated)
    }

    /// The post-publish pipeline: summary generation, search indexing, sync
    /// hash, cache version bumps, CDN purge.
    ///
    /// Runs detached after an immediate publish and from the job worker for
    /// scheduled ones. Collaborator failures are logged and skipped; every
    /// step is idempotent and the next publish repeats them.
    pub async fn run_post_process(&self, post_id: Uuid) -> Result<(), PostError> {
        let Some(mut post) = self.posts.find_by_id(post_id).await? else {
            warn!(post_id = %post_id, "post vanished before post-processing");
            return Ok(());
        };

        if !post.is_published() {
            debug!(post_id = %post_id, "post no longer published, skipping post-process");
            return Ok(());
        }

        if post.summary.is_none() {
            let text = post.content.plain_text();
            if !text.is_empty() {
                match self.summarizer.summarize(&text).await {
                    Ok(summary) => {
                        self.writer.update_summary(post_id, &summary).await?;
                        post.summary = Some(summary);
                    }
                    Err(error) => {
                        warn!(post_id = %post_id, %error, "summarization failed, continuing");
                    }
                }
            }
        }

        let tags = self.tags.tags_for_post(post_id).await?;

        let document = SearchDocument {
            id: post.id,
            slug: post.slug.clone(),
            title: post.title.clone(),
            body: post.content.plain_text(),
            tags: tags.iter().map(|tag| tag.name.clone()).collect(),
            published_at: post.published_at,
        };
        if let Err(error) = self.search.upsert(&document).await {
            warn!(post_id = %post_id, %error, "search index update failed");
        }

        let hash = public_content_hash(&post, &Self::tag_ids(&tags));
        self.cache.put_raw(&sync_hash_key(post_id), hash, None);

        self.cache.bump_version(POSTS_LIST_NS);
        self.cache.bump_version(POSTS_DETAIL_NS);

        if let Err(error) = self.cdn.purge_post(&post.slug).await {
            warn!(post_id = %post_id, %error, "CDN purge failed");
        }

        info!(post_id = %post_id, slug = post.slug, "post-process pipeline completed");
        Ok(())
    }

    fn spawn_media_resync(&self, post_id: Uuid, urls: Vec<String>) {
        let media = Arc::clone(&self.media);
        tokio::spawn(async move {
            if let Err(error) = media.replace_post_media(post_id, &urls).await {
                warn!(post_id = %post_id, %error, "media reference resync failed");
            }
        });
    }
}
