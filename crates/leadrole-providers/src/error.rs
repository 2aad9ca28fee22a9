//! Provider client error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider request failed with {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Provider returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("Provider operation has no poll URL")]
    MissingPollUrl,

    #[error("Provider produced no output")]
    EmptyOutput,

    #[error("Timed out after {waited_secs} seconds of polling")]
    PollTimeout { waited_secs: u64 },

    #[error("Provider configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::RequestFailed { status, .. } => {
                *status == 429 || *status >= 500
            }
            _ => false,
        }
    }
}
