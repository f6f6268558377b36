use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{MediaRepo, RepoError};
use crate::infra::db::map_sqlx_error;

use super::PostgresRepositories;

#[async_trait]
impl MediaRepo for PostgresRepositories {
    async fn replace_post_media(&self, post_id: Uuid, urls: &[String]) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM post_media WHERE post_id = $1")
            .bind(post_id)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;

        if !urls.is_empty() {
            sqlx::query(
                "INSERT INTO post_media (post_id, url, position) \
                 SELECT $1, u.url, u.ord::int FROM unnest($2::text[]) WITH ORDINALITY AS u(url, ord)",
            )
            .bind(post_id)
            .bind(urls.to_vec())
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn delete_post_media(&self, post_id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM post_media WHERE post_id = $1")
            .bind(post_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
