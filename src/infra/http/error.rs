use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::application::posts::PostError;

/// Error surfaced to API callers: a status code and a stable public message.
/// The underlying detail is logged, never returned.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<PostError> for ApiError {
    fn from(err: PostError) -> Self {
        match &err {
            PostError::NotFound => Self::new(StatusCode::NOT_FOUND, "Post not found"),
            PostError::Validation(_) => {
                Self::new(StatusCode::BAD_REQUEST, "Request could not be processed")
            }
            PostError::Pagination(_) => Self::new(StatusCode::BAD_REQUEST, "Invalid cursor"),
            PostError::Repo(_) | PostError::Render(_) => {
                error!(error = %err, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}
