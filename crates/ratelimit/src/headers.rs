use std::time::Duration;

/// Rate limit information extracted from one HTTP response.
///
/// Header names are matched case-insensitively. The 429 JSON body fields
/// (`retry_after` in float seconds, `global`) take precedence over the
/// headers when present since they carry millisecond precision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub status: u16,
    /// `X-RateLimit-Bucket`: opaque key shared by routes with one quota
    pub bucket: Option<String>,
    /// `X-RateLimit-Limit`
    pub limit: Option<u32>,
    /// `X-RateLimit-Remaining`
    pub remaining: Option<u32>,
    /// `X-RateLimit-Reset-After`
    pub reset_after: Option<Duration>,
    /// `Retry-After` header or the body's `retry_after`
    pub retry_after: Option<Duration>,
    /// `X-RateLimit-Global` or the body's `global`
    pub global: bool,
    /// `X-RateLimit-Scope`: `user`, `global` or `shared`
    pub scope: Option<String>,
}

impl RateLimitHeaders {
    /// Parse from response headers. Malformed values are ignored.
    pub fn parse<'a, I>(status: u16, headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut parsed = Self {
            status,
            ..Default::default()
        };
        for (name, value) in headers {
            let value = value.trim();
            match name.to_ascii_lowercase().as_str() {
                "x-ratelimit-bucket" => parsed.bucket = Some(value.to_string()),
                "x-ratelimit-limit" => parsed.limit = value.parse().ok(),
                "x-ratelimit-remaining" => parsed.remaining = value.parse().ok(),
                "x-ratelimit-reset-after" => parsed.reset_after = parse_seconds(value),
                "retry-after" => {
                    if parsed.retry_after.is_none() {
                        parsed.retry_after = parse_seconds(value);
                    }
                }
                "x-ratelimit-global" => parsed.global = value.eq_ignore_ascii_case("true"),
                "x-ratelimit-scope" => parsed.scope = Some(value.to_string()),
                _ => {}
            }
        }
        parsed
    }

    /// Overlay the fields of a 429 body
    pub fn with_body(mut self, retry_after: Option<f64>, global: Option<bool>) -> Self {
        if let Some(secs) = retry_after.and_then(duration_from_secs) {
            self.retry_after = Some(secs);
        }
        if let Some(global) = global {
            self.global |= global;
        }
        self
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// A 429 whose scope is `shared` counts against a resource quota, not
    /// against this client's bucket.
    pub fn is_shared_scope(&self) -> bool {
        self.scope.as_deref() == Some("shared")
    }

    /// How long a 429 parks its bucket (or every bucket, if global)
    pub fn park_duration(&self) -> Duration {
        self.retry_after
            .or(self.reset_after)
            .unwrap_or(Duration::from_secs(1))
    }
}

fn parse_seconds(value: &str) -> Option<Duration> {
    value.parse::<f64>().ok().and_then(duration_from_secs)
}

fn duration_from_secs(secs: f64) -> Option<Duration> {
    // Millisecond resolution is all the server reports.
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_millis((secs * 1000.0).round() as u64))
}
