//! Admission control for outbound calls to rate-limited services.
//!
//! This crate decides, per call, whether a request to an external dependency
//! may go out now, should wait, or should be refused.
//!
//! # Features
//!
//! - **Four strategies**: token bucket, sliding window, fixed window, and an
//!   adaptive token bucket tuned by latency and error feedback
//! - **Concurrency slots**: every admission reserves one of `burst_size` slots,
//!   released by a permit guard or an explicit [`RateLimiter::release`]
//! - **Per-tenant isolation**: [`TenantLimiters`] lazily creates one limiter per key
//! - **Async waiting**: [`AsyncRateLimiter`] suspends tasks instead of rejecting them
//! - **Tower integration**: [`RateLimitLayer`]
//! - **Event system**: observability through [`RateLimiterEvent`]s
//!
//! # Examples
//!
//! ```
//! use callguard_ratelimiter::{RateLimitConfig, RateLimiter, Strategy};
//! use callguard_core::FailureKind;
//! use std::time::Duration;
//!
//! let limiter = RateLimiter::new(
//!     RateLimitConfig::builder()
//!         .name("github")
//!         .strategy(Strategy::Adaptive)
//!         .requests_per_second(10.0)
//!         .burst_size(20)
//!         .on_rate_adjusted(|from, to, reason| {
//!             println!("rate {from} -> {to} ({reason})");
//!         })
//!         .build()
//!         .unwrap(),
//! );
//!
//! if limiter.acquire(Some(Duration::from_millis(200))) {
//!     // ... issue the request, then report back ...
//!     limiter.record_failure(FailureKind::RateLimited);
//!     limiter.release();
//! }
//! assert_eq!(limiter.status().current_rate, 5.0);
//! ```

mod adaptive;
mod asynchronous;
mod bucket;
mod config;
mod decision;
mod error;
mod events;
mod layer;
mod limiter;
mod registry;
mod window;

pub use adaptive::{AdaptiveController, RateAdjustment, ADJUSTMENT_INTERVAL};
pub use asynchronous::AsyncRateLimiter;
pub use bucket::TokenBucket;
pub use config::{RateLimitConfig, RateLimitConfigBuilder, RateLimitSettings, Strategy};
pub use decision::Decision;
pub use error::{ConfigError, RateLimitExceeded};
pub use events::{AdjustmentReason, RateLimiterEvent};
pub use layer::{RateLimitLayer, RateLimited};
pub use limiter::{RateLimiter, RateLimiterPermit, RateLimiterStatus};
pub use registry::TenantLimiters;
pub use window::{FixedWindowCounter, SlidingWindowCounter};

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// A panic while holding one of these locks cannot leave the guarded state
// half-updated, so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
