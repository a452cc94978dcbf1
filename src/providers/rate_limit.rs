//! Per-provider process-wide rate limiting (spec §5): one mutex + last
//! request timestamp per provider, `wait = max(0, min_interval - elapsed)`.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = if requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };
        Self { min_interval, last_request: Mutex::new(None) }
    }

    /// Blocks until at least `min_interval` has elapsed since the last
    /// acquisition, then records the new timestamp.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn back_to_back_acquires_are_spaced_by_min_interval() {
        let limiter = RateLimiter::new(20.0); // 50ms interval
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn zero_rate_never_waits() {
        let limiter = RateLimiter::new(0.0);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(20));
    }
}
