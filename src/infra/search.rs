//! HTTP client for the external search-index backend.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::application::repos::{CollaboratorError, SearchDocument, SearchIndex};

/// Pushes document mutations to a search backend over HTTP.
///
/// Constructed without an endpoint the client is disabled: mutations succeed
/// as no-ops, which is how a deployment without a search backend runs.
pub struct HttpSearchIndex {
    client: Client,
    endpoint: Option<Url>,
}

impl HttpSearchIndex {
    pub fn new(client: Client, endpoint: Option<Url>) -> Self {
        Self { client, endpoint }
    }

    fn document_url(&self, base: &Url, id: Uuid) -> Result<Url, CollaboratorError> {
        base.join(&format!("documents/{id}"))
            .map_err(|err| CollaboratorError::Malformed(err.to_string()))
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn upsert(&self, document: &SearchDocument) -> Result<(), CollaboratorError> {
        let Some(base) = &self.endpoint else {
            debug!(post_id = %document.id, "search index disabled, skipping upsert");
            return Ok(());
        };

        let url = self.document_url(base, document.id)?;
        let response = self
            .client
            .put(url)
            .json(document)
            .send()
            .await
            .map_err(|err| CollaboratorError::Transport(err.to_string()))?;

        ensure_success(response.status())
    }

    async fn delete(&self, id: Uuid) -> Result<(), CollaboratorError> {
        let Some(base) = &self.endpoint else {
            debug!(post_id = %id, "search index disabled, skipping delete");
            return Ok(());
        };

        let url = self.document_url(base, id)?;
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|err| CollaboratorError::Transport(err.to_string()))?;

        // A document that was never indexed is an acceptable delete target.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response.status())
    }
}

pub(crate) fn ensure_success(status: reqwest::StatusCode) -> Result<(), CollaboratorError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(CollaboratorError::Status {
            status: status.as_u16(),
        })
    }
}
