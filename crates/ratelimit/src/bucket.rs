use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::headers::RateLimitHeaders;

/// One server-side quota.
///
/// Callers queue on `turnstile` (a fair mutex, so the head of the queue is
/// always the earliest arrival) and only the head inspects `state`. In-flight
/// requests do not hold the turnstile, so a bucket with capacity admits
/// several concurrent requests.
#[derive(Debug)]
pub(crate) struct Bucket {
    pub(crate) key: String,
    /// Placeholder created for a route whose real bucket is not known yet
    pub(crate) provisional: bool,
    pub(crate) state: Mutex<BucketState>,
    pub(crate) turnstile: tokio::sync::Mutex<()>,
    pub(crate) notify: Notify,
}

#[derive(Debug, Default)]
pub(crate) struct BucketState {
    /// `None` until a response reported the quota
    pub(crate) limit: Option<u32>,
    pub(crate) remaining: u32,
    pub(crate) reset_at: Option<Instant>,
    /// Set by a 429; no request is admitted before this instant
    pub(crate) parked_until: Option<Instant>,
    pub(crate) in_flight: u32,
    /// The route answered without any rate limit headers
    pub(crate) unlimited: bool,
    /// Where waiters go once a provisional bucket learns its real key
    pub(crate) redirect: Option<Arc<Bucket>>,
}

pub(crate) enum Admission {
    Go,
    WaitUntil(Instant),
    WaitForRelease,
    Redirect(Arc<Bucket>),
}

impl Bucket {
    /// Allows exactly one discovery request until a response arrives
    pub(crate) fn provisional(key: String) -> Self {
        Self::with_state(key, true, BucketState {
            remaining: 1,
            ..Default::default()
        })
    }

    pub(crate) fn discovered(key: String) -> Self {
        Self::with_state(key, false, BucketState::default())
    }

    fn with_state(key: String, provisional: bool, state: BucketState) -> Self {
        Self {
            key,
            provisional,
            state: Mutex::new(state),
            turnstile: tokio::sync::Mutex::new(()),
            notify: Notify::new(),
        }
    }

    /// Request finished without a response (cancelled or transport error)
    pub(crate) fn cancel(&self) {
        {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            if self.provisional && state.limit.is_none() && !state.unlimited {
                // Discovery failed; let the next caller try.
                state.remaining = 1;
            }
        }
        self.notify.notify_waiters();
    }
}

impl BucketState {
    pub(crate) fn admit(&mut self, now: Instant) -> Admission {
        if let Some(target) = &self.redirect {
            return Admission::Redirect(Arc::clone(target));
        }
        if let Some(until) = self.parked_until {
            if until > now {
                return Admission::WaitUntil(until);
            }
            self.parked_until = None;
        }
        if self.unlimited {
            self.in_flight += 1;
            return Admission::Go;
        }
        if let Some(reset) = self.reset_at {
            if reset <= now {
                if let Some(limit) = self.limit {
                    self.remaining = limit;
                }
                self.reset_at = None;
            }
        }
        if self.remaining == 0 && self.reset_at.is_none() && self.in_flight == 0 {
            // Nothing outstanding will ever report a reset; start a fresh window.
            self.remaining = self.limit.unwrap_or(1);
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            self.in_flight += 1;
            return Admission::Go;
        }
        match self.reset_at {
            Some(reset) => Admission::WaitUntil(reset),
            None => Admission::WaitForRelease,
        }
    }

    /// Fold one response into the bucket. The caller has already removed the
    /// response's own request from `in_flight`.
    pub(crate) fn update(&mut self, headers: &RateLimitHeaders, now: Instant) {
        let first_report = self.limit.is_none();
        if let Some(limit) = headers.limit {
            self.limit = Some(limit);
        }
        if let Some(remaining) = headers.remaining {
            // Requests still in flight will consume from what the server reported.
            let available = remaining.saturating_sub(self.in_flight);
            self.remaining = if first_report {
                available
            } else {
                self.remaining.min(available)
            };
        }
        if let Some(after) = headers.reset_after {
            let reset = now + after;
            self.reset_at = Some(match self.reset_at {
                Some(prev) if prev > now => prev.max(reset),
                _ => reset,
            });
        }
        if headers.is_rate_limited() && !headers.global && !headers.is_shared_scope() {
            let until = now + headers.park_duration();
            self.parked_until = Some(self.parked_until.map_or(until, |p| p.max(until)));
            self.remaining = 0;
            self.reset_at = Some(self.reset_at.map_or(until, |r| r.max(until)));
        }
    }

    pub(crate) fn reset_in(&self, now: Instant) -> Option<Duration> {
        self.reset_at.map(|r| r.saturating_duration_since(now))
    }
}
