//! Error types for the remote API layer.
//!
//! None of these reach the caller of the compiler: the client logs them and
//! degrades to an empty result.

use thiserror::Error;

/// Errors raised while talking to the Notion API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether the remote answered with a 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => *status == 404,
            ApiError::Http(e) => e.status().is_some_and(|s| s.as_u16() == 404),
            _ => false,
        }
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;
