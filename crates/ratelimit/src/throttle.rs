use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Async pacer allowing `capacity` permits per `window`, refilled
/// continuously.
///
/// Tracks the instant at which the bucket would be full again: each permit
/// pushes it forward by `window / capacity`, and a caller waits while it
/// would lie more than one window ahead.
#[derive(Debug)]
pub struct Throttle {
    spacing: Duration,
    window: Duration,
    full_at: Mutex<Instant>,
}

impl Throttle {
    pub fn new(capacity: u32, window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            spacing: window / capacity,
            window: window.max(Duration::from_nanos(1)),
            full_at: Mutex::new(Instant::now()),
        }
    }

    /// Wait until a permit is available and take it.
    /// Returns the time spent waiting.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        loop {
            let wait = {
                let now = Instant::now();
                let mut full_at = self.full_at.lock();
                let next = (*full_at).max(now) + self.spacing;
                if next <= now + self.window {
                    *full_at = next;
                    return started.elapsed();
                }
                next - self.window - now
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_steady_rate() {
        let throttle = Throttle::new(2, Duration::from_secs(1));
        assert_eq!(throttle.acquire().await, Duration::ZERO);
        assert_eq!(throttle.acquire().await, Duration::ZERO);
        assert_eq!(throttle.acquire().await, Duration::from_millis(500));
        assert_eq!(throttle.acquire().await, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_refills_up_to_capacity() {
        let throttle = Throttle::new(2, Duration::from_secs(1));
        throttle.acquire().await;
        throttle.acquire().await;
        tokio::time::advance(Duration::from_secs(10)).await;

        let started = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(throttle.acquire().await, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_command_window() {
        let throttle = Throttle::new(120, Duration::from_secs(60));
        for _ in 0..120 {
            assert_eq!(throttle.acquire().await, Duration::ZERO);
        }
        let waited = throttle.acquire().await;
        assert!(waited >= Duration::from_millis(499), "waited {waited:?}");
        assert!(waited <= Duration::from_millis(501), "waited {waited:?}");
    }
}
