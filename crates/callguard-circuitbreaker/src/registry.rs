use crate::breaker::{BreakerSnapshot, CircuitBreaker};
use crate::config::CircuitBreakerConfig;
use crate::error::{CircuitBreakerError, ConfigError};
use crate::{read, write};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Named circuit breakers, and helpers that run calls through them.
///
/// Calls naming a breaker that was never registered run unguarded.
///
/// ```rust
/// use callguard_circuitbreaker::BreakerRegistry;
/// use std::time::Duration;
///
/// # async fn example() {
/// let breakers = BreakerRegistry::new();
/// breakers
///     .register_breaker("github", 5, Duration::from_secs(60))
///     .unwrap();
///
/// let body = breakers
///     .call_with_breaker("github", || async { Ok::<_, std::io::Error>("ok") })
///     .await;
/// assert_eq!(body.unwrap(), "ok");
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct BreakerRegistry {
    breakers: Arc<RwLock<HashMap<String, CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a breaker named `name` and stores it.
    ///
    /// An existing breaker with the same name is replaced.
    pub fn register_breaker(
        &self,
        name: &str,
        failure_threshold: u32,
        cooldown: Duration,
    ) -> Result<CircuitBreaker, ConfigError> {
        let config = CircuitBreakerConfig::builder()
            .name(name)
            .failure_threshold(failure_threshold)
            .cooldown(cooldown)
            .build()?;
        Ok(self.register(config))
    }

    /// Creates a breaker from a full configuration and stores it under its name.
    ///
    /// An existing breaker with the same name is replaced.
    pub fn register(&self, config: CircuitBreakerConfig) -> CircuitBreaker {
        let breaker = CircuitBreaker::new(config);

        #[cfg(feature = "tracing")]
        tracing::debug!(breaker = %breaker.name(), "circuit breaker registered");

        write(&self.breakers).insert(breaker.name().to_string(), breaker.clone());
        breaker
    }

    /// The breaker registered under `name`.
    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        read(&self.breakers).get(name).cloned()
    }

    /// Names of all registered breakers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = read(&self.breakers).keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshots of all registered breakers, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let breakers: Vec<CircuitBreaker> = read(&self.breakers).values().cloned().collect();
        let mut snapshots: Vec<_> = breakers.iter().map(CircuitBreaker::snapshot).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Runs `f` through the breaker named `name`.
    ///
    /// Without a registered breaker `f` runs directly. See
    /// [`CircuitBreaker::call`].
    pub async fn call_with_breaker<F, Fut, T, E>(
        &self,
        name: &str,
        f: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get(name) {
            Some(breaker) => breaker.call(f).await,
            None => f().await.map_err(CircuitBreakerError::Inner),
        }
    }

    /// Blocking form of [`call_with_breaker`](Self::call_with_breaker).
    pub fn call_with_breaker_sync<F, T, E>(
        &self,
        name: &str,
        f: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        match self.get(name) {
            Some(breaker) => breaker.call_sync(f),
            None => f().map_err(CircuitBreakerError::Inner),
        }
    }
}
