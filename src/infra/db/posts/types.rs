use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::RepoError;
use crate::domain::content::ContentDocument;
use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Uuid,
    pub(crate) slug: String,
    pub(crate) title: String,
    pub(crate) content: serde_json::Value,
    pub(crate) summary: Option<String>,
    pub(crate) status: PostStatus,
    pub(crate) published_at: Option<OffsetDateTime>,
    pub(crate) read_time_minutes: i32,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl PostRow {
    pub(crate) fn into_record(self) -> Result<PostRecord, RepoError> {
        let content: ContentDocument = serde_json::from_value(self.content)
            .map_err(|err| RepoError::from_persistence(format!("malformed post content: {err}")))?;

        Ok(PostRecord {
            id: self.id,
            slug: self.slug,
            title: self.title,
            content,
            summary: self.summary,
            status: self.status,
            published_at: self.published_at,
            read_time_minutes: self.read_time_minutes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
