use callguard_core::GuardError;
use std::time::Duration;
use thiserror::Error;

/// Admission was refused.
///
/// `retry_after` is the limiter's estimate of when a permit will next be
/// available. It is `None` when the rejection came from the concurrency slots
/// rather than from the rate itself.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("rate limit exceeded for '{name}'")]
pub struct RateLimitExceeded {
    /// Name of the limiter (the tenant key for registry-managed limiters).
    pub name: String,
    /// Suggested wait before trying again.
    pub retry_after: Option<Duration>,
}

impl<E> From<RateLimitExceeded> for GuardError<E> {
    fn from(err: RateLimitExceeded) -> Self {
        GuardError::RateLimited {
            name: err.name,
            retry_after: err.retry_after,
        }
    }
}

/// A [`RateLimitConfig`](crate::RateLimitConfig) violated one of its invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `requests_per_second` must be finite and greater than zero.
    #[error("requests_per_second must be > 0, got {0}")]
    NonPositiveRate(f64),

    /// `burst_size` must be at least one.
    #[error("burst_size must be > 0")]
    ZeroBurst,

    /// The window must be at least one second long.
    #[error("window_size must be at least 1s, got {0:?}")]
    WindowTooShort(Duration),

    /// The adaptive bounds must bracket the baseline rate.
    #[error("adaptive bounds must satisfy 0 < min ({min}) <= requests_per_second ({rate}) <= max ({max})")]
    AdaptiveBounds {
        /// Configured lower bound.
        min: f64,
        /// Configured baseline.
        rate: f64,
        /// Configured upper bound.
        max: f64,
    },

    /// The backoff factor must lie strictly between 0 and 1.
    #[error("backoff_factor must be in (0, 1), got {0}")]
    BackoffFactor(f64),

    /// The increase factor must be greater than 1.
    #[error("increase_factor must be > 1, got {0}")]
    IncreaseFactor(f64),
}
