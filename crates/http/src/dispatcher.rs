use concord_ratelimit::{RateLimitConfig, RateLimitHeaders, RateLimiter};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ApiError, HttpError, Result};
use crate::route::{Request, Route};
use crate::transport::{HttpResponse, ReqwestTransport, Transport};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Retries after a 429 before giving up with `RateLimitExceeded`
    pub max_rate_limit_retries: u32,
    /// Retries after a 5xx or network failure
    pub max_server_retries: u32,
    /// First 5xx backoff, doubled per attempt
    pub server_backoff_base: Duration,
    pub server_backoff_max: Duration,
    pub ratelimit: RateLimitConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 3,
            max_server_retries: 3,
            server_backoff_base: Duration::from_millis(500),
            server_backoff_max: Duration::from_secs(8),
            ratelimit: RateLimitConfig::default(),
        }
    }
}

impl HttpConfig {
    fn server_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.server_backoff_base
            .saturating_mul(factor)
            .min(self.server_backoff_max)
    }
}

#[derive(Deserialize)]
struct RateLimitBody {
    retry_after: Option<f64>,
    global: Option<bool>,
}

/// Issues API requests through the rate limiter, retrying 429s and 5xx.
#[derive(Clone)]
pub struct HttpDispatcher {
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    config: Arc<HttpConfig>,
}

impl HttpDispatcher {
    pub fn new(transport: Arc<dyn Transport>, config: HttpConfig) -> Self {
        let limiter = RateLimiter::new(config.ratelimit.clone());
        Self {
            transport,
            limiter,
            config: Arc::new(config),
        }
    }

    /// Dispatcher over `reqwest` for the given API base URL
    pub fn with_reqwest(
        api_url: &str,
        token: &str,
        timeout: Duration,
        config: HttpConfig,
    ) -> Result<Self> {
        let transport = ReqwestTransport::new(api_url, token, timeout)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn get<T: DeserializeOwned>(&self, route: Route) -> Result<T> {
        self.request(Request::new(route)).await
    }

    /// Send a request and decode the JSON response. An empty body decodes
    /// as `null`, so `()` and `Option<_>` work for 204 responses.
    pub async fn request<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let route = request.route.to_string();
        let resp = self.send(&request).await?;
        let body = if resp.body.trim().is_empty() {
            "null"
        } else {
            resp.body.as_str()
        };
        serde_json::from_str(body).map_err(|source| HttpError::Decode { route, source })
    }

    /// Send a request and return the raw successful response
    pub async fn send(&self, request: &Request) -> Result<HttpResponse> {
        let key = request.route.key();
        let route = request.route.to_string();
        let mut rate_limited = 0u32;
        let mut failures = 0u32;

        loop {
            let ticket = self.limiter.acquire(&key).await?;
            debug!(%route, waited_ms = ticket.waited().as_millis() as u64, "sending request");

            let resp = match self.transport.send(request).await {
                Ok(resp) => resp,
                Err(HttpError::Network(reason)) => {
                    drop(ticket);
                    failures += 1;
                    if failures > self.config.max_server_retries {
                        return Err(HttpError::Network(reason));
                    }
                    let backoff = self.config.server_backoff(failures);
                    warn!(%route, attempt = failures, backoff_ms = backoff.as_millis() as u64, error = %reason, "network error, retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                Err(other) => return Err(other),
            };

            let mut headers = RateLimitHeaders::parse(
                resp.status,
                resp.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            );
            if resp.status == 429 {
                if let Ok(body) = serde_json::from_str::<RateLimitBody>(&resp.body) {
                    headers = headers.with_body(body.retry_after, body.global);
                }
            }
            self.limiter.release(ticket, &headers);

            match resp.status {
                200..=299 => return Ok(resp),
                429 => {
                    rate_limited += 1;
                    if rate_limited > self.config.max_rate_limit_retries {
                        return Err(HttpError::RateLimitExceeded {
                            route,
                            attempts: rate_limited,
                            retry_after: headers.park_duration(),
                        });
                    }
                    if headers.is_shared_scope() {
                        // Shared-scope 429s leave the bucket open for other
                        // callers; only this request waits out the window.
                        let wait = headers.park_duration();
                        debug!(%route, wait_ms = wait.as_millis() as u64, "shared rate limit, waiting before retry");
                        tokio::time::sleep(wait).await;
                    }
                    // Otherwise the limiter holds the next attempt until the window passes.
                }
                500..=599 => {
                    failures += 1;
                    if failures > self.config.max_server_retries {
                        return Err(HttpError::Server {
                            route,
                            status: resp.status,
                            body: resp.body,
                            attempts: failures,
                        });
                    }
                    let backoff = self.config.server_backoff(failures);
                    warn!(%route, status = resp.status, attempt = failures, backoff_ms = backoff.as_millis() as u64, "server error, retrying");
                    tokio::time::sleep(backoff).await;
                }
                status => {
                    let api = serde_json::from_str::<ApiError>(&resp.body).ok();
                    return Err(HttpError::Client {
                        route,
                        status,
                        body: resp.body,
                        api,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_backoff_doubles_and_caps() {
        let config = HttpConfig::default();
        assert_eq!(config.server_backoff(1), Duration::from_millis(500));
        assert_eq!(config.server_backoff(2), Duration::from_secs(1));
        assert_eq!(config.server_backoff(3), Duration::from_secs(2));
        assert_eq!(config.server_backoff(10), Duration::from_secs(8));
    }
}
