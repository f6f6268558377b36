use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::posts::{PostError, PostsService};
use crate::application::repos::{JobsRepo, RepoError};
use crate::domain::entities::JobRecord;
use crate::domain::types::JobKind;

use super::ScheduledPublishPayload;

const CLAIM_BATCH: u32 = 16;

/// Polls the jobs table and executes due scheduled publications.
pub struct PublishWorker {
    jobs: Arc<dyn JobsRepo>,
    posts: Arc<PostsService>,
}

impl PublishWorker {
    pub fn new(jobs: Arc<dyn JobsRepo>, posts: Arc<PostsService>) -> Self {
        Self { jobs, posts }
    }

    /// Run the polling loop until the task is aborted.
    pub async fn run(self, poll_interval: Duration) {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Err(error) = self.tick().await {
                warn!(%error, "job poll failed");
            }
        }
    }

    /// Claim and process one batch of due jobs. Returns how many ran.
    pub async fn tick(&self) -> Result<usize, RepoError> {
        let due = self
            .jobs
            .claim_due_jobs(OffsetDateTime::now_utc(), CLAIM_BATCH)
            .await?;
        let count = due.len();

        for job in due {
            self.process(job).await;
        }

        Ok(count)
    }

    async fn process(&self, job: JobRecord) {
        let job_id = job.id.clone();
        let result = match job.kind {
            JobKind::ScheduledPublish => self.process_scheduled_publish(&job).await,
        };

        match result {
            Ok(()) => {
                counter!("folio_jobs_processed_total").increment(1);
                info!(job_id, "job completed");
                if let Err(error) = self.jobs.complete_job(&job_id).await {
                    warn!(job_id, %error, "failed to mark job done");
                }
            }
            Err(error) => {
                counter!("folio_jobs_failed_total").increment(1);
                warn!(job_id, %error, "job failed");
                if let Err(error) = self.jobs.fail_job(&job_id, &error.to_string()).await {
                    warn!(job_id, %error, "failed to mark job failed");
                }
            }
        }
    }

    async fn process_scheduled_publish(&self, job: &JobRecord) -> Result<(), PostError> {
        let payload: ScheduledPublishPayload = serde_json::from_value(job.payload.clone())
            .map_err(|err| PostError::Validation(format!("malformed job payload: {err}")))?;

        self.posts.run_post_process(payload.post_id).await
    }
}
