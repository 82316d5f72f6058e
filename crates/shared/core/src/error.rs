use std::fmt;

/// How a failure should be handled by whoever observes it.
///
/// Every error surfaced by the runtime reports one of these through its
/// `classification()` accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Network fault; retry with backoff (resume if a session exists)
    Transient,
    /// Gateway closed but the session survives; RESUME
    Resumable,
    /// Gateway session is gone; IDENTIFY again
    NonResumable,
    /// Configuration or credential problem; retrying cannot help
    Fatal,
    /// Server-side rate limit persisted past the retry budget
    RateLimited,
    /// HTTP 4xx other than 429; surfaced as-is
    Client,
    /// HTTP 5xx after bounded retries
    Server,
}

impl ErrorClass {
    /// Whether an automatic retry may succeed
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Transient | Self::Resumable | Self::NonResumable | Self::Server
        )
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transient => "transient",
            Self::Resumable => "resumable",
            Self::NonResumable => "non-resumable",
            Self::Fatal => "fatal",
            Self::RateLimited => "rate-limited",
            Self::Client => "client",
            Self::Server => "server",
        };
        f.write_str(s)
    }
}

/// Implemented by every crate-level error enum
pub trait Classified {
    fn classification(&self) -> ErrorClass;
}
