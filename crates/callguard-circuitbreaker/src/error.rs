use callguard_core::GuardError;
use thiserror::Error;

/// Errors returned by calls wrapped in a circuit breaker.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call was not attempted.
    #[error("circuit breaker '{name}' is open")]
    OpenCircuit {
        /// Name of the breaker that refused the call.
        name: String,
    },

    /// The wrapped call failed. The error is passed through unchanged.
    #[error(transparent)]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit { .. })
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::OpenCircuit { .. } => None,
        }
    }
}

impl<E> From<CircuitBreakerError<E>> for GuardError<E> {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::OpenCircuit { name } => GuardError::CircuitOpen { name },
            CircuitBreakerError::Inner(e) => GuardError::Inner(e),
        }
    }
}

/// A [`CircuitBreakerConfig`](crate::CircuitBreakerConfig) violated one of its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The breaker would open before any failure.
    #[error("failure_threshold must be > 0")]
    ZeroThreshold,
}
