use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreatePostParams, PostsWriteRepo, RepoError, UpdatePostParams};
use crate::domain::content::ContentDocument;
use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;
use crate::infra::db::map_sqlx_error;

use super::super::PostgresRepositories;
use super::PostRow;

const RETURNING: &str = "RETURNING id, slug, title, content, summary, status, published_at, \
     read_time_minutes, created_at, updated_at";

fn content_to_value(content: &ContentDocument) -> Result<serde_json::Value, RepoError> {
    serde_json::to_value(content)
        .map_err(|err| RepoError::from_persistence(format!("unserializable content: {err}")))
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn insert_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let content = content_to_value(&params.content)?;

        let mut qb = QueryBuilder::new(
            "INSERT INTO posts (id, slug, title, content, summary, status, published_at, \
             read_time_minutes, created_at, updated_at) VALUES (",
        );
        let mut values = qb.separated(", ");
        values.push_bind(id);
        values.push_bind(params.slug);
        values.push_bind(params.title);
        values.push_bind(content);
        values.push_bind(params.summary);
        values.push_bind(params.status);
        values.push_bind(params.published_at);
        values.push_bind(params.read_time_minutes);
        values.push_bind(now);
        values.push_bind(now);
        qb.push(") ");
        qb.push(RETURNING);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.into_record()
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let content = content_to_value(&params.content)?;

        let mut qb = QueryBuilder::new("UPDATE posts SET slug = ");
        qb.push_bind(params.slug);
        qb.push(", title = ");
        qb.push_bind(params.title);
        qb.push(", content = ");
        qb.push_bind(content);
        qb.push(", summary = ");
        qb.push_bind(params.summary);
        qb.push(", read_time_minutes = ");
        qb.push_bind(params.read_time_minutes);
        qb.push(", updated_at = now() WHERE id = ");
        qb.push_bind(params.id);
        qb.push(" ");
        qb.push(RETURNING);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.ok_or(RepoError::NotFound)?.into_record()
    }

    async fn update_summary(&self, id: Uuid, summary: &str) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE posts SET summary = $1, updated_at = now() WHERE id = $2")
            .bind(summary)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn mark_published(
        &self,
        id: Uuid,
        published_at: OffsetDateTime,
    ) -> Result<PostRecord, RepoError> {
        let mut qb = QueryBuilder::new("UPDATE posts SET status = ");
        qb.push_bind(PostStatus::Published);
        qb.push(", published_at = ");
        qb.push_bind(published_at);
        qb.push(", updated_at = now() WHERE id = ");
        qb.push_bind(id);
        qb.push(" ");
        qb.push(RETURNING);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.ok_or(RepoError::NotFound)?.into_record()
    }

    async fn mark_unpublished(&self, id: Uuid) -> Result<PostRecord, RepoError> {
        let mut qb = QueryBuilder::new("UPDATE posts SET status = ");
        qb.push_bind(PostStatus::Draft);
        qb.push(", published_at = NULL, updated_at = now() WHERE id = ");
        qb.push_bind(id);
        qb.push(" ");
        qb.push(RETURNING);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.ok_or(RepoError::NotFound)?.into_record()
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn replace_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post_id)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;

        if !tag_ids.is_empty() {
            sqlx::query(
                "INSERT INTO post_tags (post_id, tag_id) SELECT $1, unnest($2::uuid[])",
            )
            .bind(post_id)
            .bind(tag_ids.to_vec())
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }
}
