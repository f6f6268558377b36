//! Background job plumbing: deterministic instance IDs, payloads, and the
//! polling worker that drives scheduled publications.

mod worker;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use worker::PublishWorker;

/// Deterministic instance ID for a post's scheduled publish.
///
/// One schedule per post: re-scheduling under the same ID supersedes the
/// previous instance instead of stacking a second one.
pub fn scheduled_publish_job_id(post_id: Uuid) -> String {
    format!("post-{post_id}-scheduled")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScheduledPublishPayload {
    pub post_id: Uuid,
}
