use crate::decision::Decision;
use crate::lock;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

const MAX_WAIT_NUDGES: u32 = 8;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    rate_per_second: f64,
    last_refill: Instant,
}

impl BucketState {
    /// Credits `elapsed × rate` tokens, capped at `capacity`.
    fn refill(&mut self, capacity: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_second).min(capacity);
        self.last_refill = now;
    }

    /// Shortest whole-nanosecond wait after which a refill covers `wanted`.
    fn wait_for(&self, wanted: f64) -> Duration {
        let nanos = ((wanted - self.tokens) / self.rate_per_second * 1e9).ceil();
        if !nanos.is_finite() || nanos >= u64::MAX as f64 {
            return Duration::MAX;
        }
        let mut wait = Duration::from_nanos(nanos as u64);
        // The refill works in f64 seconds, which can land a hair short.
        for _ in 0..MAX_WAIT_NUDGES {
            if self.tokens + wait.as_secs_f64() * self.rate_per_second >= wanted {
                break;
            }
            wait += Duration::from_nanos(1);
        }
        wait
    }
}

/// A token bucket refilled continuously at a configurable rate.
///
/// The bucket starts full. All state lives behind one mutex and no blocking work
/// happens while it is held, so the bucket can be shared freely across threads.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: usize,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Creates a full bucket holding `capacity` tokens, refilled at `rate_per_second`.
    pub fn new(capacity: usize, rate_per_second: f64) -> Self {
        Self {
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                rate_per_second,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes `tokens` from the bucket if that many are available.
    ///
    /// On rejection nothing is consumed and the decision carries the exact time
    /// until enough tokens will have accumulated. A request larger than the
    /// capacity can never be admitted.
    pub fn try_consume(&self, tokens: u32) -> Decision {
        let wanted = f64::from(tokens);
        let mut state = lock(&self.state);
        state.refill(self.capacity as f64, Instant::now());

        if state.tokens >= wanted {
            state.tokens -= wanted;
            Decision::Admitted
        } else {
            Decision::rejected(state.wait_for(wanted))
        }
    }

    /// Tokens currently available, after crediting the refill since the last access.
    pub fn available_tokens(&self) -> f64 {
        let mut state = lock(&self.state);
        state.refill(self.capacity as f64, Instant::now());
        state.tokens
    }

    /// Maximum number of tokens the bucket holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current refill rate.
    pub fn rate(&self) -> f64 {
        lock(&self.state).rate_per_second
    }

    /// Changes the refill rate.
    ///
    /// Time elapsed before the change is credited at the old rate.
    pub fn set_rate(&self, rate_per_second: f64) {
        let mut state = lock(&self.state);
        if state.rate_per_second == rate_per_second {
            return;
        }
        state.refill(self.capacity as f64, Instant::now());
        state.rate_per_second = rate_per_second;
    }

    /// Refills the bucket to capacity and restores `rate_per_second`.
    pub fn reset(&self, rate_per_second: f64) {
        let mut state = lock(&self.state);
        state.tokens = self.capacity as f64;
        state.rate_per_second = rate_per_second;
        state.last_refill = Instant::now();
    }
}
