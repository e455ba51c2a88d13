//! Adaptive rate limiting and circuit breaking for outbound calls.
//!
//! `callguard` keeps a process from overloading the remote services it depends
//! on. It combines two guards, each also usable on its own:
//!
//! - **Rate limiting** ([`ratelimiter`]): token bucket, sliding window, fixed
//!   window or adaptive admission, one limiter per tenant key
//! - **Circuit breaking** ([`circuitbreaker`]): named breakers that stop calling
//!   a dependency after repeated failures
//!
//! [`OutboundGuard`] wires the two together for the common case: admit the call
//! for its tenant, run it through the dependency's breaker, then feed the
//! outcome back so an adaptive limiter can slow down or speed up.
//!
//! # Features
//!
//! - `tracing`: structured logs from both guards
//! - `metrics`: counters, gauges and histograms via the `metrics` facade
//! - `serde`: deserialize [`GuardSettings`], serialize [`GuardStatus`]
//!
//! # Example
//!
//! ```rust
//! use callguard::{GuardError, OutboundGuard, RateLimitConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let guard = OutboundGuard::new(
//!     RateLimitConfig::builder()
//!         .requests_per_second(5.0)
//!         .burst_size(5)
//!         .build()?,
//! );
//! guard.register_breaker("billing", 3, Duration::from_secs(60))?;
//!
//! match guard
//!     .call("tenant-a", "billing", || async { Ok::<_, std::io::Error>("invoice") })
//!     .await
//! {
//!     Ok(invoice) => assert_eq!(invoice, "invoice"),
//!     Err(GuardError::RateLimited { retry_after, .. }) => println!("slow down: {retry_after:?}"),
//!     Err(GuardError::CircuitOpen { name }) => println!("{name} is down"),
//!     Err(GuardError::Inner(e)) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

mod guard;

pub use callguard_circuitbreaker as circuitbreaker;
pub use callguard_core as core;
pub use callguard_ratelimiter as ratelimiter;

pub use callguard_circuitbreaker::{BreakerRegistry, CircuitBreaker, CircuitState};
pub use callguard_core::{FailureClassifier, FailureKind, GuardError};
pub use callguard_ratelimiter::{RateLimitConfig, RateLimiter, Strategy, TenantLimiters};
pub use guard::{GuardSettings, GuardStatus, OutboundGuard, SettingsError};
