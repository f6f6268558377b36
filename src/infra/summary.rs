//! HTTP client for the text-summarization backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::application::repos::{CollaboratorError, Summarizer};

use super::search::ensure_success;

/// Summaries longer than this are truncated before storage; the backend is
/// asked for a short abstract, not an essay.
const MAX_SUMMARY_CHARS: usize = 600;

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct SummarizeResponse {
    summary: String,
}

/// Calls the summarization backend. Disabled when no endpoint is configured,
/// in which case posts simply keep an empty summary until an editor writes
/// one.
pub struct HttpSummarizer {
    client: Client,
    endpoint: Option<Url>,
}

impl HttpSummarizer {
    pub fn new(client: Client, endpoint: Option<Url>) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, CollaboratorError> {
        let Some(base) = &self.endpoint else {
            debug!("summarizer disabled");
            return Err(CollaboratorError::Transport(
                "summarizer endpoint not configured".to_string(),
            ));
        };

        let url = base
            .join("summarize")
            .map_err(|err| CollaboratorError::Malformed(err.to_string()))?;

        let response = self
            .client
            .post(url)
            .json(&SummarizeRequest { text })
            .send()
            .await
            .map_err(|err| CollaboratorError::Transport(err.to_string()))?;

        ensure_success(response.status())?;

        let body: SummarizeResponse = response
            .json()
            .await
            .map_err(|err| CollaboratorError::Malformed(err.to_string()))?;

        let mut summary = body.summary;
        if summary.chars().count() > MAX_SUMMARY_CHARS {
            summary = summary.chars().take(MAX_SUMMARY_CHARS).collect();
        }
        Ok(summary)
    }
}
