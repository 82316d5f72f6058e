//! Concord rate limiting
//!
//! ```text
//!   acquire(route) ──► route table ──► Bucket (provisional until discovered)
//!        │                                  │  fair turnstile, one head waiter
//!        ▼                                  ▼
//!   GlobalLimit (rps ceiling + global 429 park)
//!        │
//!        ▼
//!     Ticket ──► HTTP request ──► release(ticket, headers)
//! ```
//!
//! Buckets are discovered lazily from the `X-RateLimit-Bucket` response
//! header. Until a route's first response arrives, one request is allowed
//! through and concurrent callers of that route wait for it.

pub mod error;
mod bucket;
mod headers;
mod limiter;
mod throttle;

pub use error::{RateLimitError, Result};
pub use headers::RateLimitHeaders;
pub use limiter::{BucketInfo, RateLimitConfig, RateLimiter, RouteKey, Ticket};
pub use throttle::Throttle;
