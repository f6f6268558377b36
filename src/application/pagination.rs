//! Shared cursor pagination helpers.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct PostCursorPayload {
    #[serde(with = "time::serde::rfc3339")]
    published_at: OffsetDateTime,
    id: Uuid,
}

/// Keyset cursor for public post listings, ordered by publication time then
/// ID, both descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostCursor {
    published_at: OffsetDateTime,
    id: Uuid,
}

impl PostCursor {
    pub fn new(published_at: OffsetDateTime, id: Uuid) -> Self {
        Self { published_at, id }
    }

    pub fn published_at(&self) -> OffsetDateTime {
        self.published_at
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Encode the cursor as an opaque URL-safe token.
    pub fn encode(&self) -> String {
        let payload = PostCursorPayload {
            published_at: self.published_at,
            id: self.id,
        };
        let json = serde_json::to_vec(&payload).expect("cursor payload serialization cannot fail");
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: PostCursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            published_at: payload.published_at,
            id: payload.id,
        })
    }
}

/// One page of results plus the token for the next page, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}
