use callguard_circuitbreaker::{
    BreakerRegistry, BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitBreakerError,
};
use callguard_core::classifier::{DefaultClassifier, FailureClassifier};
use callguard_core::GuardError;
use callguard_ratelimiter::{
    RateLimitConfig, RateLimitSettings, RateLimiter, RateLimiterStatus, TenantLimiters,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Everything an [`OutboundGuard`] needs, in plain data.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GuardSettings {
    /// Template for every tenant's limiter.
    pub rate_limit: RateLimitSettings,
    /// Breakers to register, by name.
    pub breakers: BTreeMap<String, BreakerSettings>,
    /// How long a call may wait for admission, in milliseconds. Absent means
    /// calls are rejected as soon as no permit is available.
    pub acquire_timeout_ms: Option<u64>,
}

/// Either half of [`GuardSettings`] was invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    /// The rate-limit template was invalid.
    #[error("invalid rate limit settings: {0}")]
    RateLimit(#[source] callguard_ratelimiter::ConfigError),

    /// A breaker definition was invalid.
    #[error("invalid settings for breaker '{name}': {source}")]
    Breaker {
        /// Name of the offending breaker.
        name: String,
        /// What was wrong with it.
        #[source]
        source: callguard_circuitbreaker::ConfigError,
    },
}

/// Observability view of a whole [`OutboundGuard`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GuardStatus {
    /// One entry per tenant, sorted by key.
    pub limiters: Vec<RateLimiterStatus>,
    /// One entry per breaker, sorted by name.
    pub breakers: Vec<BreakerSnapshot>,
}

/// Rate limiting and circuit breaking for one process's outbound calls.
///
/// An `OutboundGuard` owns the per-tenant limiters and the named breakers and
/// runs operations through both: admission for the tenant key first, then the
/// breaker, then the operation itself. The outcome is reported back to the
/// tenant's limiter so an adaptive limiter can tune its rate.
///
/// Construct one at startup and share it (it is cheap to clone).
///
/// ```rust
/// use callguard::{OutboundGuard, RateLimitConfig, Strategy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let guard = OutboundGuard::new(
///     RateLimitConfig::builder()
///         .strategy(Strategy::Adaptive)
///         .requests_per_second(10.0)
///         .build()?,
/// )
/// .with_acquire_timeout(Duration::from_millis(500));
/// guard.register_breaker("github", 5, Duration::from_secs(60))?;
///
/// let repos = guard
///     .call("org-42", "github", || async { Ok::<_, std::io::Error>(vec!["callguard"]) })
///     .await?;
/// assert_eq!(repos.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OutboundGuard {
    limiters: TenantLimiters,
    breakers: BreakerRegistry,
    acquire_timeout: Option<Duration>,
}

impl OutboundGuard {
    /// Creates a guard whose tenants all follow `template`.
    pub fn new(template: RateLimitConfig) -> Self {
        Self {
            limiters: TenantLimiters::new(template),
            breakers: BreakerRegistry::new(),
            acquire_timeout: None,
        }
    }

    /// Builds a guard and registers its breakers from plain settings.
    pub fn from_settings(settings: GuardSettings) -> Result<Self, SettingsError> {
        let template = settings
            .rate_limit
            .into_config("<template>")
            .map_err(SettingsError::RateLimit)?;

        let mut guard = Self::new(template);
        guard.acquire_timeout = settings.acquire_timeout_ms.map(Duration::from_millis);

        for (name, breaker) in settings.breakers {
            let config = breaker
                .into_config(name.as_str())
                .map_err(|source| SettingsError::Breaker {
                    name: name.clone(),
                    source,
                })?;
            guard.breakers.register(config);
        }
        Ok(guard)
    }

    /// Lets calls wait up to `timeout` for admission.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Registers (or replaces) a breaker.
    pub fn register_breaker(
        &self,
        name: &str,
        failure_threshold: u32,
        cooldown: Duration,
    ) -> Result<CircuitBreaker, callguard_circuitbreaker::ConfigError> {
        self.breakers
            .register_breaker(name, failure_threshold, cooldown)
    }

    /// The per-tenant limiters.
    pub fn limiters(&self) -> &TenantLimiters {
        &self.limiters
    }

    /// The named breakers.
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Runs `op` for tenant `key` through the breaker named `breaker`.
    ///
    /// Any `Err` from `op` is reported to the limiter as
    /// [`FailureKind::Other`](callguard_core::FailureKind::Other); use
    /// [`call_classified`](Self::call_classified) to report richer kinds.
    pub async fn call<F, Fut, T, E>(&self, key: &str, breaker: &str, op: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(key, breaker, &DefaultClassifier, op)
            .await
    }

    /// Like [`call`](Self::call), with `classifier` deciding what the limiter is told.
    ///
    /// The breaker still counts every `Err` as a failure.
    pub async fn call_classified<C, F, Fut, T, E>(
        &self,
        key: &str,
        breaker: &str,
        classifier: &C,
        op: F,
    ) -> Result<T, GuardError<E>>
    where
        C: FailureClassifier<T, E>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let limiter = self.limiters.for_key(key);
        let _permit = limiter.try_acquire_async(self.acquire_timeout).await?;

        let start = Instant::now();
        let result = self.breakers.call_with_breaker(breaker, op).await;
        report(&limiter, breaker, classifier, result, start.elapsed())
    }

    /// Blocking form of [`call`](Self::call).
    ///
    /// Waits for admission on the current thread; do not use inside async tasks.
    pub fn call_sync<F, T, E>(&self, key: &str, breaker: &str, op: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let limiter = self.limiters.for_key(key);
        let _permit = limiter.try_acquire(self.acquire_timeout)?;

        let start = Instant::now();
        let result = self.breakers.call_with_breaker_sync(breaker, op);
        report(&limiter, breaker, &DefaultClassifier, result, start.elapsed())
    }

    /// Status of the limiter for `key`, if that tenant has made any call.
    pub fn status(&self, key: &str) -> Option<RateLimiterStatus> {
        self.limiters.get(key).map(|limiter| limiter.status())
    }

    /// Status of every tenant and breaker.
    pub fn status_all(&self) -> GuardStatus {
        GuardStatus {
            limiters: self.limiters.status_all(),
            breakers: self.breakers.snapshots(),
        }
    }
}

// Feeds the outcome back to the tenant's limiter. An open circuit says
// nothing about the remote's capacity, so it is not reported.
fn report<C, T, E>(
    limiter: &RateLimiter,
    breaker: &str,
    classifier: &C,
    result: Result<T, CircuitBreakerError<E>>,
    latency: Duration,
) -> Result<T, GuardError<E>>
where
    C: FailureClassifier<T, E>,
{
    let result = match result {
        Ok(value) => Ok(value),
        Err(CircuitBreakerError::Inner(err)) => Err(err),
        Err(open @ CircuitBreakerError::OpenCircuit { .. }) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(tenant = limiter.name(), breaker, "call skipped, circuit open");
            #[cfg(not(feature = "tracing"))]
            let _ = breaker;
            return Err(open.into());
        }
    };

    match classifier.classify(&result) {
        None => limiter.record_success(latency),
        Some(kind) => limiter.record_failure(kind),
    }
    result.map_err(GuardError::Inner)
}
