//! HTTP client for the edge-cache purge endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::application::repos::{CdnPurger, CollaboratorError};

use super::search::ensure_success;

#[derive(Serialize)]
struct PurgeRequest<'a> {
    paths: [&'a str; 1],
}

/// Issues purge requests against the CDN API. Disabled (a no-op) when no
/// endpoint is configured.
pub struct HttpCdnPurger {
    client: Client,
    endpoint: Option<Url>,
}

impl HttpCdnPurger {
    pub fn new(client: Client, endpoint: Option<Url>) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl CdnPurger for HttpCdnPurger {
    async fn purge_post(&self, slug: &str) -> Result<(), CollaboratorError> {
        let Some(base) = &self.endpoint else {
            debug!(slug, "CDN purge disabled, skipping");
            return Ok(());
        };

        let url = base
            .join("purge")
            .map_err(|err| CollaboratorError::Malformed(err.to_string()))?;
        let path = format!("/posts/{slug}");

        let response = self
            .client
            .post(url)
            .json(&PurgeRequest { paths: [&path] })
            .send()
            .await
            .map_err(|err| CollaboratorError::Transport(err.to_string()))?;

        ensure_success(response.status())
    }
}
