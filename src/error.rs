//! Error types.
//!
//! `AnalyzeError` is the only failure that reaches a user: it means the article
//! itself could not be obtained. Model failures (`MlError`) are absorbed per
//! chunk or per entity inside the reconciler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("invalid input: {0}")]
    InvalidUrl(String),

    #[error("could not fetch article: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("article request returned HTTP {0}")]
    Status(u16),

    #[error("no article text could be extracted")]
    EmptyArticle,

    #[error("analysis worker failed: {0}")]
    Worker(String),
}

impl AnalyzeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AnalyzeError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            AnalyzeError::Fetch(_) | AnalyzeError::Status(_) => StatusCode::BAD_GATEWAY,
            AnalyzeError::EmptyArticle => StatusCode::UNPROCESSABLE_ENTITY,
            AnalyzeError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body for the API
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

/// Failure of one call to an ML capability.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("ML sidecar unreachable: {0}")]
    Transport(String),

    #[error("ML sidecar returned HTTP {0}")]
    Status(u16),

    #[error("could not decode ML response: {0}")]
    Decode(String),

    #[error("ML capability returned no result")]
    EmptyResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AnalyzeError::InvalidUrl("ftp://x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AnalyzeError::Status(404).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AnalyzeError::EmptyArticle.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_invalid_url_message_is_user_facing() {
        let err = AnalyzeError::InvalidUrl("not a url".into());
        assert_eq!(err.to_string(), "invalid input: not a url");
    }
}
