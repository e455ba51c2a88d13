//! Property-based tests for callguard.
//!
//! Each module drives one guard on a paused-time runtime so that generated
//! schedules run instantly and deterministically.

pub mod adaptive;
pub mod circuit_breaker;
pub mod rate_limiter;

/// A current-thread runtime whose clock only moves when told to.
pub fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}
