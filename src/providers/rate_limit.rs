//! Per-provider token-bucket rate limiting.
//!
//! One [`TokenBucket`] guards each provider's outbound call rate. The bucket
//! refills continuously rather than on a fixed tick; all reads and writes of
//! its token count happen under one mutex, so concurrent acquirers never
//! race for the same token even though each releases the lock before
//! sleeping out a deficit.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct BucketState {
    tokens: f64,
    last_update: Instant,
}

/// A continuously-refilling token bucket shared across tasks via `Arc`.
pub struct TokenBucket {
    max_tokens: f64,
    period: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// `max_rate` tokens are available per `period` (e.g. 60 requests/minute
    /// is `TokenBucket::new(60.0, Duration::from_secs(60))`).
    pub fn new(max_rate: f64, period: Duration) -> Self {
        Self {
            max_tokens: max_rate,
            period,
            state: Mutex::new(BucketState {
                tokens: max_rate,
                last_update: Instant::now(),
            }),
        }
    }

    /// Block until a token is available, then consume it.
    ///
    /// Refills the bucket based on elapsed wall-clock time, capped at
    /// `max_rate`. If no token is available, computes the wait for the next
    /// token to accrue, releases the lock, and sleeps; it then re-acquires
    /// the lock and re-checks, since another caller may have taken the
    /// refreshed token first.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_update).as_secs_f64();
                let refill_rate = self.max_tokens / self.period.as_secs_f64();
                state.tokens = (state.tokens + elapsed * refill_rate).min(self.max_tokens);
                state.last_update = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / refill_rate))
                }
            };

            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }
}
