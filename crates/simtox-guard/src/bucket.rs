//! Token-bucket rate limiter.
//!
//! One bucket guards one provider's quota. Tokens refill continuously at
//! `per_second` up to `burst`; each upstream call consumes one. A caller that
//! finds the bucket empty sleeps until the next token is due, as long as that
//! fits inside its wait budget. If it cannot, it fails immediately instead of
//! sleeping out the budget first.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// The bucket could not supply a token within the caller's wait budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted {
    /// Time already spent waiting before giving up.
    pub waited: Duration,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct TokenBucket {
    per_second: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// `per_second` must be positive and `burst` at least 1; the config layer
    /// validates both.
    #[must_use]
    pub fn new(per_second: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            per_second,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Bucket capacity.
    #[must_use]
    pub fn burst(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let burst = self.burst as u32;
        burst
    }

    /// Take one token, waiting at most `max_wait` for it.
    ///
    /// # Errors
    ///
    /// Returns [`Exhausted`] when the next token cannot arrive before the
    /// wait budget runs out.
    pub async fn acquire(&self, max_wait: Duration) -> Result<(), Exhausted> {
        let started = Instant::now();
        // `None` means the budget reaches past any representable instant.
        let deadline = started.checked_add(max_wait);

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = elapsed.mul_add(self.per_second, state.tokens).min(self.burst);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                Duration::try_from_secs_f64((1.0 - state.tokens) / self.per_second).ok()
            };

            let now = Instant::now();
            let due = wait.and_then(|wait| now.checked_add(wait).map(|due| (wait, due)));
            let wait = match (due, deadline) {
                (Some((wait, due)), Some(deadline)) if due <= deadline => wait,
                (Some((wait, _)), None) => wait,
                _ => {
                    return Err(Exhausted {
                        waited: now.duration_since(started),
                    });
                }
            };
            tracing::debug!(wait_ms = wait.as_millis(), "rate limit: waiting for token");
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently available, after refill. Fractional.
    pub async fn available(&self) -> f64 {
        let state = self.state.lock().await;
        let elapsed = Instant::now().duration_since(state.last_refill).as_secs_f64();
        elapsed.mul_add(self.per_second, state.tokens).min(self.burst)
    }
}
