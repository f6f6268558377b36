use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{JobsRepo, RepoError, ScheduleJobParams, TerminateOutcome};
use crate::domain::entities::JobRecord;
use crate::domain::types::{JobKind, JobState};
use crate::infra::db::map_sqlx_error;

use super::PostgresRepositories;

const JOB_COLUMNS: &str =
    "id, kind, payload, state, run_at, attempts, last_error, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    kind: String,
    payload: serde_json::Value,
    state: String,
    run_at: OffsetDateTime,
    attempts: i32,
    last_error: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl JobRow {
    fn into_record(self) -> Result<JobRecord, RepoError> {
        let kind = JobKind::try_from(self.kind.as_str()).map_err(|()| {
            RepoError::from_persistence(format!("unknown job kind `{}`", self.kind))
        })?;
        let state = JobState::try_from(self.state.as_str()).map_err(|()| {
            RepoError::from_persistence(format!("unknown job state `{}`", self.state))
        })?;

        Ok(JobRecord {
            id: self.id,
            kind,
            payload: self.payload,
            state,
            run_at: self.run_at,
            attempts: self.attempts,
            last_error: self.last_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl JobsRepo for PostgresRepositories {
    async fn schedule_job(&self, params: ScheduleJobParams) -> Result<JobRecord, RepoError> {
        let row: JobRow = sqlx::query_as(&format!(
            "INSERT INTO jobs (id, kind, payload, state, run_at, attempts, created_at, updated_at) \
             VALUES ($1, $2, $3, 'scheduled', $4, 0, now(), now()) \
             ON CONFLICT (id) DO UPDATE SET kind = EXCLUDED.kind, payload = EXCLUDED.payload, \
             state = 'scheduled', run_at = EXCLUDED.run_at, attempts = 0, last_error = NULL, \
             updated_at = now() \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(&params.id)
        .bind(params.kind.as_str())
        .bind(&params.payload)
        .bind(params.run_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.into_record()
    }

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        row.map(JobRow::into_record).transpose()
    }

    async fn terminate_job(&self, id: &str) -> Result<TerminateOutcome, RepoError> {
        let killed = sqlx::query(
            "UPDATE jobs SET state = 'killed', updated_at = now() \
             WHERE id = $1 AND state IN ('scheduled', 'running')",
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if killed.rows_affected() > 0 {
            return Ok(TerminateOutcome::Terminated);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM jobs WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if exists {
            Ok(TerminateOutcome::AlreadyFinished)
        } else {
            Ok(TerminateOutcome::NotFound)
        }
    }

    async fn claim_due_jobs(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<JobRecord>, RepoError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "UPDATE jobs SET state = 'running', attempts = attempts + 1, updated_at = now() \
             WHERE id IN (SELECT id FROM jobs WHERE state = 'scheduled' AND run_at <= $1 \
             ORDER BY run_at LIMIT $2 FOR UPDATE SKIP LOCKED) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(now)
        .bind(limit.clamp(1, 100) as i64)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_record).collect()
    }

    async fn complete_job(&self, id: &str) -> Result<(), RepoError> {
        sqlx::query("UPDATE jobs SET state = 'done', updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn fail_job(&self, id: &str, error: &str) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE jobs SET state = 'failed', last_error = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}
