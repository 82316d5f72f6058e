use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::bucket::{Admission, Bucket};
use crate::error::{RateLimitError, Result};
use crate::headers::RateLimitHeaders;
use crate::throttle::Throttle;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Process-wide requests-per-second ceiling; `None` disables it
    pub global_per_second: Option<u32>,
    /// Fail `acquire` instead of waiting longer than this
    pub max_wait: Option<Duration>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_per_second: Some(50),
            max_wait: None,
        }
    }
}

/// Identifies a route for bucketing: the method and path template plus the
/// value of its major parameter (channel, guild or webhook id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub route: String,
    pub major: String,
}

impl RouteKey {
    pub fn new(route: impl Into<String>, major: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            major: major.into(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.route, self.major)
    }
}

/// Point-in-time view of a bucket
#[derive(Debug, Clone, PartialEq)]
pub struct BucketInfo {
    pub key: String,
    pub discovered: bool,
    pub limit: Option<u32>,
    pub remaining: u32,
    pub reset_in: Option<Duration>,
    pub in_flight: u32,
    pub parked: bool,
}

/// Permission to issue one request.
///
/// Hand it back with [`RateLimiter::release`] together with the response
/// headers. Dropping it unreleased returns its in-flight slot.
#[must_use = "a ticket must be released with the response headers"]
pub struct Ticket {
    bucket: Arc<Bucket>,
    route: RouteKey,
    waited: Duration,
    released: bool,
}

impl Ticket {
    pub fn route(&self) -> &RouteKey {
        &self.route
    }

    /// Time spent queued before the ticket was issued
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("bucket", &self.bucket.key)
            .field("route", &self.route)
            .field("waited", &self.waited)
            .finish()
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.released {
            self.bucket.cancel();
        }
    }
}

struct GlobalLimit {
    parked_until: Mutex<Option<Instant>>,
    throttle: Option<Throttle>,
}

impl GlobalLimit {
    fn park(&self, until: Instant) {
        let mut parked = self.parked_until.lock();
        *parked = Some(parked.map_or(until, |p| p.max(until)));
    }

    fn parked_until(&self, now: Instant) -> Option<Instant> {
        self.parked_until.lock().filter(|until| *until > now)
    }
}

struct Inner {
    config: RateLimitConfig,
    /// Route → bucket currently serving it
    routes: DashMap<RouteKey, Arc<Bucket>>,
    /// `"{bucket header}:{major}"` → discovered bucket
    buckets: DashMap<String, Arc<Bucket>>,
    global: GlobalLimit,
}

/// Header-driven rate limiter shared by every HTTP caller in the process.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let throttle = config
            .global_per_second
            .filter(|rps| *rps > 0)
            .map(|rps| Throttle::new(rps, Duration::from_secs(1)));
        Self {
            inner: Arc::new(Inner {
                config,
                routes: DashMap::new(),
                buckets: DashMap::new(),
                global: GlobalLimit {
                    parked_until: Mutex::new(None),
                    throttle,
                },
            }),
        }
    }

    fn bucket_for(&self, route: &RouteKey) -> Arc<Bucket> {
        self.inner
            .routes
            .entry(route.clone())
            .or_insert_with(|| Arc::new(Bucket::provisional(format!("route:{route}"))))
            .clone()
    }

    /// Wait for capacity on the route's bucket and on the global limit.
    ///
    /// Callers of one bucket are admitted in arrival order.
    pub async fn acquire(&self, route: &RouteKey) -> Result<Ticket> {
        let started = Instant::now();
        let mut bucket = self.bucket_for(route);

        loop {
            let next = {
                let _turn = bucket.turnstile.lock().await;
                loop {
                    let notified = bucket.notify.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();

                    let now = Instant::now();
                    let admission = bucket.state.lock().admit(now);
                    match admission {
                        Admission::Go => {
                            let mut ticket = Ticket {
                                bucket: Arc::clone(&bucket),
                                route: route.clone(),
                                waited: Duration::ZERO,
                                released: false,
                            };
                            // On error the ticket drops and returns its slot.
                            self.wait_global(route).await?;
                            ticket.waited = started.elapsed();
                            return Ok(ticket);
                        }
                        Admission::Redirect(target) => break target,
                        Admission::WaitUntil(at) => {
                            let wait = at.saturating_duration_since(now);
                            self.check_wait(route, wait)?;
                            debug!(bucket = %bucket.key, %route, wait_ms = wait.as_millis() as u64, "waiting for bucket reset");
                            tokio::select! {
                                _ = sleep_until(at) => {}
                                _ = &mut notified => {}
                            }
                        }
                        Admission::WaitForRelease => notified.await,
                    }
                }
            };
            // Re-queue behind the callers already waiting on the real bucket.
            bucket = next;
        }
    }

    async fn wait_global(&self, route: &RouteKey) -> Result<()> {
        loop {
            let now = Instant::now();
            match self.inner.global.parked_until(now) {
                Some(until) => {
                    self.check_wait(route, until - now)?;
                    sleep_until(until).await;
                }
                None => break,
            }
        }
        if let Some(throttle) = &self.inner.global.throttle {
            throttle.acquire().await;
        }
        Ok(())
    }

    fn check_wait(&self, route: &RouteKey, wait: Duration) -> Result<()> {
        match self.inner.config.max_wait {
            Some(max) if wait > max => Err(RateLimitError::WaitTooLong {
                route: route.to_string(),
                wait,
                max,
            }),
            _ => Ok(()),
        }
    }

    /// Return a ticket with the response's rate limit headers.
    ///
    /// The first bucket key reported for a route is bound to it; routes
    /// reporting the same key (and major parameter) share one bucket.
    pub fn release(&self, mut ticket: Ticket, headers: &RateLimitHeaders) {
        ticket.released = true;
        let now = Instant::now();
        let bucket = Arc::clone(&ticket.bucket);

        if headers.is_rate_limited() {
            warn!(
                bucket = %bucket.key,
                route = %ticket.route,
                retry_after_ms = headers.park_duration().as_millis() as u64,
                global = headers.global,
                scope = headers.scope.as_deref().unwrap_or("user"),
                "rate limited"
            );
            if headers.global {
                self.inner.global.park(now + headers.park_duration());
            }
        }

        let rebind_to = headers
            .bucket
            .as_ref()
            .map(|hash| format!("{hash}:{}", ticket.route.major))
            .filter(|key| *key != bucket.key);

        match rebind_to {
            Some(key) => {
                let target = self
                    .inner
                    .buckets
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Bucket::discovered(key.clone())))
                    .clone();
                target.state.lock().update(headers, now);
                self.inner
                    .routes
                    .insert(ticket.route.clone(), Arc::clone(&target));
                debug!(route = %ticket.route, bucket = %key, "bucket discovered");
                {
                    let mut state = bucket.state.lock();
                    state.in_flight = state.in_flight.saturating_sub(1);
                    if bucket.provisional {
                        state.redirect = Some(Arc::clone(&target));
                    }
                }
                target.notify.notify_waiters();
            }
            None => {
                let mut state = bucket.state.lock();
                state.in_flight = state.in_flight.saturating_sub(1);
                if bucket.provisional
                    && state.limit.is_none()
                    && headers.bucket.is_none()
                    && headers.limit.is_none()
                    && !headers.is_rate_limited()
                {
                    state.unlimited = true;
                }
                state.update(headers, now);
            }
        }
        bucket.notify.notify_waiters();
    }

    /// Current state of the bucket serving `route`, if the route was seen
    pub fn bucket_info(&self, route: &RouteKey) -> Option<BucketInfo> {
        let bucket = self.inner.routes.get(route)?.clone();
        let now = Instant::now();
        let state = bucket.state.lock();
        Some(BucketInfo {
            key: bucket.key.clone(),
            discovered: !bucket.provisional,
            limit: state.limit,
            remaining: state.remaining,
            reset_in: state.reset_in(now),
            in_flight: state.in_flight,
            parked: state.parked_until.is_some_and(|p| p > now),
        })
    }

    /// Number of distinct discovered buckets
    pub fn bucket_count(&self) -> usize {
        self.inner.buckets.len()
    }

    /// Remaining time of a global 429 park
    pub fn global_park(&self) -> Option<Duration> {
        let now = Instant::now();
        self.inner
            .global
            .parked_until(now)
            .map(|until| until - now)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("routes", &self.inner.routes.len())
            .field("buckets", &self.inner.buckets.len())
            .finish()
    }
}
