use concord_core::{Classified, ErrorClass};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The bucket (or the global limit) would hold the caller longer than
    /// the configured maximum wait
    #[error("rate limit on {route} requires waiting {wait:?}, over the {max:?} maximum")]
    WaitTooLong {
        route: String,
        wait: Duration,
        max: Duration,
    },
}

impl Classified for RateLimitError {
    fn classification(&self) -> ErrorClass {
        ErrorClass::RateLimited
    }
}

pub type Result<T> = std::result::Result<T, RateLimitError>;
