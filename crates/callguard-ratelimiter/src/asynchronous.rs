use crate::bucket::TokenBucket;
use crate::config::RateLimitConfig;
use crate::decision::Decision;
use crate::error::RateLimitExceeded;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Token bucket for async call sites that would rather wait than be rejected.
///
/// [`acquire`](Self::acquire) first takes one of `burst_size` waiting slots,
/// then sleeps until the bucket has a token. The slot bounds how many tasks can
/// queue for tokens at once and is released when `acquire` returns, whether or
/// not it succeeded.
///
/// Waiters are not served in FIFO order: whichever task wakes up and finds a
/// token first takes it.
#[derive(Debug, Clone)]
pub struct AsyncRateLimiter {
    name: String,
    bucket: Arc<TokenBucket>,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl AsyncRateLimiter {
    /// Creates a limiter with `burst_size` tokens and `burst_size` waiting slots.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            name: config.name.clone(),
            bucket: Arc::new(TokenBucket::new(
                config.burst_size,
                config.requests_per_second,
            )),
            slots: Arc::new(Semaphore::new(config.burst_size)),
            capacity: config.burst_size,
        }
    }

    /// Waits until a token is available and takes it.
    pub async fn acquire(&self) {
        // The semaphore is never closed.
        let Ok(_slot) = self.slots.acquire().await else {
            return;
        };
        loop {
            match self.bucket.try_consume(1) {
                Decision::Admitted => return,
                Decision::Rejected { retry_after } => tokio::time::sleep(retry_after).await,
            }
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up after `timeout`.
    ///
    /// Returns as soon as it is clear that no token can arrive in time.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<(), RateLimitExceeded> {
        let deadline = Instant::now() + timeout;
        let slot = tokio::time::timeout_at(deadline, self.slots.acquire()).await;
        let Ok(Ok(_slot)) = slot else {
            return Err(self.exceeded(None));
        };

        loop {
            match self.bucket.try_consume(1) {
                Decision::Admitted => return Ok(()),
                Decision::Rejected { retry_after } => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if retry_after > remaining {
                        return Err(self.exceeded(Some(retry_after)));
                    }
                    tokio::time::sleep(retry_after).await;
                }
            }
        }
    }

    fn exceeded(&self, retry_after: Option<Duration>) -> RateLimitExceeded {
        #[cfg(feature = "tracing")]
        tracing::debug!(ratelimiter = %self.name, ?retry_after, "async permit timed out");

        RateLimitExceeded {
            name: self.name.clone(),
            retry_after,
        }
    }

    /// Tokens currently in the bucket.
    pub fn available_tokens(&self) -> f64 {
        self.bucket.available_tokens()
    }

    /// Number of tasks currently holding a waiting slot.
    pub fn waiting(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    /// Limiter name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
