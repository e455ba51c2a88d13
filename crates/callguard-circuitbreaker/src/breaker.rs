use crate::circuit::{Circuit, CircuitState, Transition};
use crate::config::CircuitBreakerConfig;
use crate::error::CircuitBreakerError;
use crate::events::CircuitBreakerEvent;
use crate::lock;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Point-in-time view of a breaker, for observability.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BreakerSnapshot {
    /// Breaker name.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Failures since the last success or reset.
    pub consecutive_failures: u32,
    /// Failures that open the circuit.
    pub failure_threshold: u32,
    /// Time the circuit stays open after the last failure.
    pub cooldown: Duration,
    /// Time since the most recent failure, if any was recorded.
    pub since_last_failure: Option<Duration>,
    /// Successful calls since construction.
    pub total_successes: u64,
    /// Failed calls since construction.
    pub total_failures: u64,
    /// Calls refused while open, since construction.
    pub total_rejections: u64,
}

#[derive(Debug)]
struct Shared {
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
    state: AtomicU8,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

/// Failure-counting circuit breaker for one named dependency.
///
/// The breaker opens after `failure_threshold` consecutive failures and stays
/// open until strictly more than `cooldown` has passed since the last failure.
/// The next [`can_attempt`](Self::can_attempt) after that closes it again, or
/// with the half-open probe enabled lets exactly one trial call through. Any
/// success closes the circuit and clears the failure count.
///
/// Cloning is cheap and clones share state.
///
/// # Examples
///
/// ```rust
/// use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::new(
///     CircuitBreakerConfig::builder()
///         .name("payments")
///         .failure_threshold(2)
///         .cooldown(Duration::from_secs(30))
///         .build()
///         .unwrap(),
/// );
///
/// let fail = || Err::<(), _>("timeout");
/// assert!(breaker.call_sync(fail).unwrap_err().into_inner().is_some());
/// assert!(breaker.call_sync(fail).is_err());
/// assert_eq!(breaker.state(), CircuitState::Open);
/// assert!(breaker.call_sync(fail).unwrap_err().is_circuit_open());
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    inner: Arc<Shared>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "circuitbreaker_calls_total",
                    "Total number of calls through the circuit breaker by outcome"
                );
                describe_counter!(
                    "circuitbreaker_transitions_total",
                    "Total number of circuit breaker state transitions"
                );
                describe_gauge!(
                    "circuitbreaker_state",
                    "Current circuit state (0 = closed, 1 = open, 2 = half-open)"
                );
            });
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone()).set(0.0);
        }

        Self {
            inner: Arc::new(Shared {
                circuit: Mutex::new(Circuit::new(
                    config.failure_threshold,
                    config.cooldown,
                    config.half_open_probe,
                )),
                state: AtomicU8::new(CircuitState::Closed as u8),
                successes: AtomicU64::new(0),
                failures: AtomicU64::new(0),
                rejections: AtomicU64::new(0),
                config,
            }),
        }
    }

    /// Breaker name.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// The configuration this breaker was built from.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.inner.config
    }

    /// Returns the current state without locking.
    ///
    /// An open circuit whose cooldown has passed still reports
    /// [`CircuitState::Open`] until the next [`can_attempt`](Self::can_attempt).
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Failures since the last success or reset.
    pub fn consecutive_failures(&self) -> u32 {
        lock(&self.inner.circuit).consecutive_failures()
    }

    /// Whether a call may be attempted now.
    ///
    /// Performs the cooldown transition when it is due.
    pub fn can_attempt(&self) -> bool {
        let (allowed, transition) = self.update(|circuit| circuit.can_attempt(Instant::now()));
        self.apply(transition);
        allowed
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let (transition, state) = self.update(|circuit| (circuit.record_success(), circuit.state()));
        self.inner.successes.fetch_add(1, Ordering::Relaxed);

        self.inner
            .config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                name: self.inner.config.name.clone(),
                timestamp: Instant::now(),
                state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => self.inner.config.name.clone(), "outcome" => "success")
            .increment(1);

        self.apply(transition);
    }

    /// Records a failed call.
    pub fn record_failure(&self) {
        let (transition, state, consecutive_failures) = self.update(|circuit| {
            let transition = circuit.record_failure(Instant::now());
            (transition, circuit.state(), circuit.consecutive_failures())
        });
        self.inner.failures.fetch_add(1, Ordering::Relaxed);

        self.inner
            .config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                name: self.inner.config.name.clone(),
                timestamp: Instant::now(),
                state,
                consecutive_failures,
            });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            breaker = %self.inner.config.name,
            consecutive_failures,
            "failure recorded"
        );

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => self.inner.config.name.clone(), "outcome" => "failure")
            .increment(1);

        self.apply(transition);
    }

    /// Opens the circuit now, as if the threshold had just been reached.
    pub fn force_open(&self) {
        let transition = self.update(|circuit| circuit.force_open(Instant::now()));
        self.apply(transition);
    }

    /// Closes the circuit and clears the failure count.
    ///
    /// The cumulative counters in [`snapshot`](Self::snapshot) are kept.
    pub fn reset(&self) {
        let transition = self.update(Circuit::reset);
        self.apply(transition);
    }

    /// Current state and counters.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let (state, consecutive_failures, last_failure) = {
            let circuit = lock(&self.inner.circuit);
            (
                circuit.state(),
                circuit.consecutive_failures(),
                circuit.last_failure(),
            )
        };
        let config = &self.inner.config;

        BreakerSnapshot {
            name: config.name.clone(),
            state,
            consecutive_failures,
            failure_threshold: config.failure_threshold,
            cooldown: config.cooldown,
            since_last_failure: last_failure.map(|at| at.elapsed()),
            total_successes: self.inner.successes.load(Ordering::Relaxed),
            total_failures: self.inner.failures.load(Ordering::Relaxed),
            total_rejections: self.inner.rejections.load(Ordering::Relaxed),
        }
    }

    /// Runs `f` through the breaker.
    ///
    /// Fails with [`CircuitBreakerError::OpenCircuit`] without calling `f` when
    /// the circuit is open. Otherwise the outcome of `f` is recorded and its
    /// error, if any, is returned unchanged inside [`CircuitBreakerError::Inner`].
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit::<E>()?;
        self.record(f().await)
    }

    /// Blocking form of [`call`](Self::call).
    pub fn call_sync<F, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.admit::<E>()?;
        self.record(f())
    }

    pub(crate) fn admit<E>(&self) -> Result<(), CircuitBreakerError<E>> {
        if self.can_attempt() {
            return Ok(());
        }
        self.inner.rejections.fetch_add(1, Ordering::Relaxed);

        self.inner
            .config
            .event_listeners
            .emit(&CircuitBreakerEvent::CallRejected {
                name: self.inner.config.name.clone(),
                timestamp: Instant::now(),
            });

        #[cfg(feature = "tracing")]
        tracing::debug!(breaker = %self.inner.config.name, "call rejected, circuit open");

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => self.inner.config.name.clone(), "outcome" => "rejected")
            .increment(1);

        Err(CircuitBreakerError::OpenCircuit {
            name: self.inner.config.name.clone(),
        })
    }

    fn record<T, E>(&self, result: Result<T, E>) -> Result<T, CircuitBreakerError<E>> {
        match result {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Mutates the circuit under its lock and publishes the resulting state
    /// before the lock is released, so `state()` and the gauge follow the
    /// order in which transitions actually happened.
    fn update<R>(&self, f: impl FnOnce(&mut Circuit) -> R) -> R {
        let mut circuit = lock(&self.inner.circuit);
        let before = circuit.state();
        let out = f(&mut circuit);
        let after = circuit.state();
        if after != before {
            self.inner.state.store(after as u8, Ordering::Release);

            #[cfg(feature = "metrics")]
            gauge!("circuitbreaker_state", "circuitbreaker" => self.inner.config.name.clone())
                .set(f64::from(after as u8));
        }
        out
    }

    /// Emits events, logs and counters for a transition made by [`update`](Self::update).
    fn apply(&self, transition: Option<Transition>) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        let config = &self.inner.config;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                name: config.name.clone(),
                timestamp: Instant::now(),
                from_state: from,
                to_state: to,
            });

        #[cfg(feature = "tracing")]
        {
            if to == CircuitState::Open {
                tracing::warn!(breaker = %config.name, %from, "circuit opened");
            } else {
                tracing::info!(breaker = %config.name, %from, %to, "circuit state transition");
            }
        }

        #[cfg(feature = "metrics")]
        counter!(
            "circuitbreaker_transitions_total",
            "circuitbreaker" => config.name.clone(),
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use std::sync::atomic::AtomicUsize;

    fn breaker(threshold: u32, cooldown_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .name("test")
                .failure_threshold(threshold)
                .cooldown(Duration::from_secs(cooldown_secs))
                .build()
                .unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_three_cooldown_sixty() {
        let breaker = breaker(3, 60);
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert!(!breaker.can_attempt());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!breaker.can_attempt());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(breaker.can_attempt());
        assert_eq!(breaker.consecutive_failures(), 0);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.can_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn call_skips_operation_when_open() {
        let breaker = breaker(1, 60);
        let calls = AtomicUsize::new(0);

        let first = breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("boom")
            })
            .await;
        assert_eq!(first.unwrap_err().into_inner(), Some("boom"));

        let second = breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(())
            })
            .await;
        assert!(second.unwrap_err().is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.total_failures, 1);
        assert_eq!(snapshot.total_rejections, 1);
        assert_eq!(snapshot.since_last_failure, Some(Duration::ZERO));
    }

    #[test]
    fn call_sync_passes_result_through() {
        let breaker = breaker(3, 60);
        assert_eq!(breaker.call_sync(|| Ok::<_, ()>(42)).unwrap(), 42);
        assert_eq!(breaker.snapshot().total_successes, 1);
    }

    #[test]
    fn transitions_are_reported() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let rejected = Arc::new(AtomicUsize::new(0));
        let (s, r) = (Arc::clone(&seen), Arc::clone(&rejected));
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .failure_threshold(1)
                .on_state_transition(move |from, to| s.lock().unwrap().push((from, to)))
                .on_call_rejected(move || {
                    r.fetch_add(1, Ordering::SeqCst);
                })
                .build()
                .unwrap(),
        );

        breaker.record_failure();
        let _ = breaker.call_sync(|| Ok::<_, ()>(()));
        breaker.reset();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::Closed),
            ]
        );
        assert_eq!(rejected.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_probe_lets_one_call_through() {
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .failure_threshold(1)
                .cooldown(Duration::from_secs(5))
                .half_open_probe(true)
                .build()
                .unwrap(),
        );
        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(6)).await;

        assert!(breaker.can_attempt());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(!breaker.can_attempt());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn state_follows_circuit_when_transitions_interleave() {
        // A success recorded between the opening failure's unlock and its
        // event emission must win: it happened last.
        let handle: Arc<OnceLock<CircuitBreaker>> = Arc::new(OnceLock::new());
        let hook = Arc::clone(&handle);
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .name("interleaved")
                .failure_threshold(1)
                .on_failure(move |_| {
                    if let Some(breaker) = hook.get() {
                        breaker.record_success();
                    }
                })
                .build()
                .unwrap(),
        );
        handle.set(breaker.clone()).unwrap();

        breaker.record_failure();

        assert_eq!(breaker.snapshot().state, CircuitState::Closed);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.can_attempt());
    }

    #[test]
    fn force_open_then_reset() {
        let breaker = breaker(5, 60);
        breaker.force_open();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.can_attempt());

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }
}
