//! Errors returned by the backend client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API base URL '{0}': must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Not signed in or session expired (HTTP 401). Run `login` again.")]
    Unauthorized,

    #[error("Backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Whether re-authenticating could fix this error.
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}
