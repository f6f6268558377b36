//! Postgres-backed repository implementations.
//!
//! Every query is runtime-checked (`QueryBuilder` / `query_as`), so the
//! crate builds without a reachable database.

mod jobs;
mod media;
mod posts;
mod tags;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder, query,
    postgres::{PgPool, PgPoolOptions},
};

use crate::application::repos::{AdminPostFilter, RepoError, SortDirection};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn apply_admin_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q AdminPostFilter) {
        if let Some(status) = filter.status {
            qb.push(" AND p.status = ");
            qb.push_bind(status);
        }

        if let Some(search) = filter.search.as_ref() {
            qb.push(" AND (p.title ILIKE ");
            qb.push_bind(format!("%{search}%"));
            qb.push(" OR p.slug ILIKE ");
            qb.push_bind(format!("%{search}%"));
            qb.push(")");
        }
    }

    fn push_admin_order(qb: &mut QueryBuilder<'_, Postgres>, filter: &AdminPostFilter) {
        use crate::application::repos::PostSortField;

        let column = match filter.sort {
            PostSortField::CreatedAt => "p.created_at",
            PostSortField::UpdatedAt => "p.updated_at",
            PostSortField::PublishedAt => "p.published_at",
            PostSortField::Title => "p.title",
        };
        let direction = match filter.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };

        qb.push(format!(
            " ORDER BY {column} {direction} NULLS LAST, p.id {direction} "
        ));
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}
