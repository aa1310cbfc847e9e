use std::time::Duration;

use tokio::time::Instant;

/// A token bucket capping the rate of write requests. Tokens refill
/// continuously; `acquire` waits until one is available. Callers share the
/// limiter behind an `Arc`, so a burst of workers drains onto the configured
/// steady rate.
#[derive(Debug)]
pub struct RateLimiter {
    state: tokio::sync::Mutex<Bucket>,
    per_second: f64,
    burst: f64,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled: Instant,
}

impl RateLimiter {
    pub fn new(per_second: f64) -> Self {
        assert!(per_second > 0.0, "rate must be positive");
        RateLimiter {
            state: tokio::sync::Mutex::new(Bucket {
                tokens: per_second,
                refilled: Instant::now(),
            }),
            per_second,
            burst: per_second,
        }
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.refilled).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.per_second).min(self.burst);
                bucket.refilled = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.per_second)
            };
            tokio::time::sleep(wait).await;
        }
    }
}
