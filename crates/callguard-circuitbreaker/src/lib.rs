//! Circuit breaking for calls to unreliable dependencies.
//!
//! A [`CircuitBreaker`] counts consecutive failures of one named dependency.
//! Once the count reaches the threshold the circuit opens and calls are
//! refused without being attempted, until a cooldown has passed since the last
//! failure.
//!
//! ## States
//!
//! - **Closed**: calls pass through; failures are counted
//! - **Open**: calls are rejected with [`CircuitBreakerError::OpenCircuit`]
//! - **HalfOpen**: only with [`half_open_probe`](CircuitBreakerConfigBuilder::half_open_probe);
//!   one trial call decides whether to close or reopen
//!
//! Without the probe, an expired cooldown closes the circuit directly and the
//! failure count starts over.
//!
//! ## Basic Example
//!
//! ```rust
//! use callguard_circuitbreaker::{BreakerRegistry, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breakers = BreakerRegistry::new();
//! breakers.register(
//!     CircuitBreakerConfig::builder()
//!         .name("inventory")
//!         .failure_threshold(3)
//!         .cooldown(Duration::from_secs(30))
//!         .on_state_transition(|from, to| println!("inventory: {from} -> {to}"))
//!         .build()?,
//! );
//!
//! let stock = breakers
//!     .call_with_breaker("inventory", || async { Ok::<_, std::io::Error>(12) })
//!     .await?;
//! assert_eq!(stock, 12);
//! # Ok(())
//! # }
//! ```
//!
//! ## Tower
//!
//! [`CircuitBreakerLayer`] wraps any `tower::Service` with a shared breaker; a
//! [`FailureClassifier`](callguard_core::FailureClassifier) decides which
//! results count as failures.

mod breaker;
mod circuit;
mod config;
mod error;
mod events;
mod layer;
mod registry;

pub use breaker::{BreakerSnapshot, CircuitBreaker};
pub use circuit::CircuitState;
pub use config::{BreakerSettings, CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::{CircuitBreakerError, ConfigError};
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};
pub use registry::BreakerRegistry;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// Breaker state is updated in single assignments, so a poisoned lock still
// guards consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
