use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PostCursor};
use crate::application::repos::{AdminPostFilter, PostsRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;
use crate::infra::db::map_sqlx_error;

use super::super::PostgresRepositories;
use super::{POST_COLUMNS, PostRow};

fn push_public_conditions(
    qb: &mut QueryBuilder<'_, sqlx::Postgres>,
    visible_until: OffsetDateTime,
) {
    qb.push(" AND p.status = ");
    qb.push_bind(PostStatus::Published);
    qb.push(" AND p.published_at IS NOT NULL AND p.published_at <= ");
    qb.push_bind(visible_until);
}

fn rows_into_records(rows: Vec<PostRow>) -> Result<Vec<PostRecord>, RepoError> {
    rows.into_iter().map(PostRow::into_record).collect()
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_public_posts(
        &self,
        cursor: Option<PostCursor>,
        limit: u32,
        tag: Option<&str>,
        visible_until: OffsetDateTime,
    ) -> Result<CursorPage<PostRecord>, RepoError> {
        let limit = limit.clamp(1, 100) as i64;

        let mut qb = QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE 1=1 "));
        push_public_conditions(&mut qb, visible_until);

        if let Some(tag) = tag {
            qb.push(
                " AND EXISTS (SELECT 1 FROM post_tags pt INNER JOIN tags t ON t.id = pt.tag_id \
                 WHERE pt.post_id = p.id AND t.slug = ",
            );
            qb.push_bind(tag);
            qb.push(")");
        }

        if let Some(cursor) = cursor {
            qb.push(" AND (p.published_at, p.id) < (");
            qb.push_bind(cursor.published_at());
            qb.push(", ");
            qb.push_bind(cursor.id());
            qb.push(")");
        }

        qb.push(" ORDER BY p.published_at DESC, p.id DESC LIMIT ");
        qb.push_bind(limit + 1);

        let mut rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let has_more = (rows.len() as i64) > limit;
        if has_more {
            rows.pop();
        }

        let next_cursor = if has_more {
            rows.last().map(|row| {
                PostCursor::new(row.published_at.unwrap_or(row.created_at), row.id).encode()
            })
        } else {
            None
        };

        Ok(CursorPage::new(rows_into_records(rows)?, next_cursor))
    }

    async fn find_by_slug(
        &self,
        slug: &str,
        public_only: bool,
        visible_until: OffsetDateTime,
    ) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.slug = "));
        qb.push_bind(slug);
        if public_only {
            push_public_conditions(&mut qb, visible_until);
        }

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(PostRow::into_record).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = "));
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(PostRow::into_record).transpose()
    }

    async fn related_post_ids(
        &self,
        post_id: Uuid,
        limit: u32,
        visible_until: OffsetDateTime,
    ) -> Result<Vec<Uuid>, RepoError> {
        let mut qb = QueryBuilder::new(
            "SELECT p.id FROM posts p \
             INNER JOIN post_tags pt ON pt.post_id = p.id \
             WHERE pt.tag_id IN (SELECT tag_id FROM post_tags WHERE post_id = ",
        );
        qb.push_bind(post_id);
        qb.push(") AND p.id <> ");
        qb.push_bind(post_id);
        push_public_conditions(&mut qb, visible_until);
        qb.push(" GROUP BY p.id, p.published_at ORDER BY COUNT(*) DESC, p.published_at DESC LIMIT ");
        qb.push_bind(limit.clamp(1, 50) as i64);

        qb.build_query_scalar::<Uuid>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn public_posts_by_ids(
        &self,
        ids: &[Uuid],
        visible_until: OffsetDateTime,
    ) -> Result<Vec<PostRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ANY("));
        qb.push_bind(ids.to_vec());
        qb.push(")");
        push_public_conditions(&mut qb, visible_until);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows_into_records(rows)
    }

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, RepoError> {
        let mut qb = QueryBuilder::new("SELECT EXISTS(SELECT 1 FROM posts p WHERE p.slug = ");
        qb.push_bind(slug);
        if let Some(exclude) = exclude {
            qb.push(" AND p.id <> ");
            qb.push_bind(exclude);
        }
        qb.push(")");

        qb.build_query_scalar::<bool>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn similar_slugs(
        &self,
        prefix: &str,
        exclude: Option<Uuid>,
    ) -> Result<Vec<String>, RepoError> {
        // Slugs only contain `[a-z0-9-]`, so the prefix needs no LIKE escaping.
        let mut qb = QueryBuilder::new("SELECT p.slug FROM posts p WHERE p.slug LIKE ");
        qb.push_bind(format!("{prefix}%"));
        if let Some(exclude) = exclude {
            qb.push(" AND p.id <> ");
            qb.push_bind(exclude);
        }

        qb.build_query_scalar::<String>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_admin_posts(
        &self,
        filter: &AdminPostFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE 1=1 "));
        Self::apply_admin_filter(&mut qb, filter);
        Self::push_admin_order(&mut qb, filter);
        qb.push(" LIMIT ");
        qb.push_bind(limit.clamp(1, 100) as i64);
        qb.push(" OFFSET ");
        qb.push_bind(offset as i64);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows_into_records(rows)
    }

    async fn count_admin_posts(&self, filter: &AdminPostFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::apply_admin_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }
}
