use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{RepoError, TagsRepo};
use crate::domain::entities::TagRecord;
use crate::infra::db::map_sqlx_error;

use super::PostgresRepositories;

#[derive(sqlx::FromRow)]
struct TagRow {
    id: Uuid,
    slug: String,
    name: String,
    created_at: OffsetDateTime,
}

impl From<TagRow> for TagRecord {
    fn from(row: TagRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostTagRow {
    post_id: Uuid,
    id: Uuid,
    slug: String,
    name: String,
    created_at: OffsetDateTime,
}

#[async_trait]
impl TagsRepo for PostgresRepositories {
    async fn tags_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError> {
        let rows: Vec<TagRow> = sqlx::query_as(
            "SELECT t.id, t.slug, t.name, t.created_at FROM tags t \
             INNER JOIN post_tags pt ON pt.tag_id = t.id \
             WHERE pt.post_id = $1 ORDER BY t.name",
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TagRecord::from).collect())
    }

    async fn tags_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, TagRecord)>, RepoError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<PostTagRow> = sqlx::query_as(
            "SELECT pt.post_id, t.id, t.slug, t.name, t.created_at FROM tags t \
             INNER JOIN post_tags pt ON pt.tag_id = t.id \
             WHERE pt.post_id = ANY($1) ORDER BY t.name",
        )
        .bind(post_ids.to_vec())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.post_id,
                    TagRecord {
                        id: row.id,
                        slug: row.slug,
                        name: row.name,
                        created_at: row.created_at,
                    },
                )
            })
            .collect())
    }
}
