use concord_core::{Classified, ErrorClass};
use concord_ratelimit::RateLimitError;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Error body returned by the API for failed requests
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("network error: {0}")]
    Network(String),

    /// 4xx other than 429, never retried
    #[error("HTTP {status} on {route}: {body}")]
    Client {
        route: String,
        status: u16,
        body: String,
        api: Option<ApiError>,
    },

    /// 5xx that persisted through the retry budget
    #[error("HTTP {status} on {route} after {attempts} attempts: {body}")]
    Server {
        route: String,
        status: u16,
        body: String,
        attempts: u32,
    },

    #[error("rate limited on {route} {attempts} times, last retry_after {retry_after:?}")]
    RateLimitExceeded {
        route: String,
        attempts: u32,
        retry_after: Duration,
    },

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error("failed to decode response from {route}: {source}")]
    Decode {
        route: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl HttpError {
    /// HTTP status, when the error came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::RateLimitExceeded { .. } => Some(429),
            _ => None,
        }
    }
}

impl Classified for HttpError {
    fn classification(&self) -> ErrorClass {
        match self {
            Self::Network(_) => ErrorClass::Transient,
            Self::Client { .. } => ErrorClass::Client,
            Self::Server { .. } => ErrorClass::Server,
            Self::RateLimitExceeded { .. } | Self::RateLimit(_) => ErrorClass::RateLimited,
            Self::Decode { .. } | Self::InvalidRequest(_) => ErrorClass::Fatal,
        }
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            HttpError::InvalidRequest(err.to_string())
        } else {
            HttpError::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;
