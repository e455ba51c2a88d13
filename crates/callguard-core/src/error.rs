//! The unified error surface raised to callers.
//!
//! Each guard has its own error type (`RateLimitExceeded`, `CircuitBreakerError`);
//! both convert into [`GuardError<E>`] so a caller composing a limiter and a breaker
//! around one operation only has to handle a single type:
//!
//! ```rust
//! use callguard_core::GuardError;
//! use std::time::Duration;
//!
//! fn describe(err: &GuardError<std::io::Error>) -> String {
//!     match err {
//!         GuardError::RateLimited { name, retry_after } => {
//!             format!("{name} throttled, retry after {retry_after:?}")
//!         }
//!         GuardError::CircuitOpen { name } => format!("{name} is unavailable"),
//!         GuardError::Inner(e) => format!("call failed: {e}"),
//!     }
//! }
//!
//! let err: GuardError<std::io::Error> = GuardError::RateLimited {
//!     name: "github".to_string(),
//!     retry_after: Some(Duration::from_secs(1)),
//! };
//! assert!(describe(&err).contains("github"));
//! ```

use std::time::Duration;
use thiserror::Error;

/// Rejection or failure of a guarded call.
///
/// `E` is the error type of the wrapped operation; it is passed through
/// unchanged in [`GuardError::Inner`].
#[derive(Debug, Clone, Error)]
pub enum GuardError<E> {
    /// Admission was refused by a rate limiter.
    #[error("rate limit exceeded for '{name}'{}", fmt_retry(.retry_after))]
    RateLimited {
        /// Limiter (or tenant key) that refused the call.
        name: String,
        /// Suggested wait before trying again, when the limiter can compute one.
        retry_after: Option<Duration>,
    },

    /// The named circuit breaker is open; the operation was not attempted.
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen {
        /// Breaker name.
        name: String,
    },

    /// The wrapped operation itself failed.
    #[error(transparent)]
    Inner(E),
}

fn fmt_retry(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {:.3}s", d.as_secs_f64()),
        None => String::new(),
    }
}

impl<E> GuardError<E> {
    /// Returns `true` for a rate-limit rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GuardError::RateLimited { .. })
    }

    /// Returns `true` for a circuit-open rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, GuardError::CircuitOpen { .. })
    }

    /// Returns `true` if the wrapped operation failed.
    pub fn is_inner(&self) -> bool {
        matches!(self, GuardError::Inner(_))
    }

    /// Suggested wait for a rate-limit rejection.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GuardError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Extracts the operation's own error.
    pub fn into_inner(self) -> Option<E> {
        match self {
            GuardError::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the operation's error, leaving rejections untouched.
    ///
    /// ```
    /// use callguard_core::GuardError;
    ///
    /// let err: GuardError<&str> = GuardError::Inner("boom");
    /// let mapped: GuardError<usize> = err.map_inner(str::len);
    /// assert_eq!(mapped.into_inner(), Some(4));
    /// ```
    pub fn map_inner<F, T>(self, f: F) -> GuardError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            GuardError::RateLimited { name, retry_after } => {
                GuardError::RateLimited { name, retry_after }
            }
            GuardError::CircuitOpen { name } => GuardError::CircuitOpen { name },
            GuardError::Inner(e) => GuardError::Inner(f(e)),
        }
    }
}
