//! Concord HTTP
//!
//! ```text
//!   Request ──► HttpDispatcher ──► RateLimiter::acquire ──► Transport::send
//!                    ▲                                            │
//!                    └── retry 429 / 5xx ◄── release(headers) ◄───┘
//! ```
//!
//! 4xx responses other than 429 are returned as-is and never retried.

pub mod error;
mod dispatcher;
mod gateway_info;
mod paginator;
mod route;
mod transport;

pub use dispatcher::{HttpConfig, HttpDispatcher};
pub use error::{ApiError, HttpError, Result};
pub use gateway_info::{GatewayInfo, SessionStartLimit};
pub use paginator::{Direction, Paginator};
pub use reqwest::Method;
pub use route::{Request, Route};
pub use transport::{HttpResponse, ReqwestTransport, Transport};
